#![no_main]

use libfuzzer_sys::fuzz_target;
use knockgate::config::loader::ConfigLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        let loader = ConfigLoader::with_defaults();
        // only panics matter
        let _ = loader.load_from_str(yaml_str);
    }
});
