mod language_test;
