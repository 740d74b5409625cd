use std::fmt;

/// Compute device an engine instance was initialized on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Accelerator,
    Cpu,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Accelerator => "cuda",
            DeviceClass::Cpu => "cpu",
        }
    }

    pub fn is_accelerator(&self) -> bool {
        matches!(self, DeviceClass::Accelerator)
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
