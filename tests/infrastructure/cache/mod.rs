mod file_content_cache_test;
