#![no_main]

use libfuzzer_sys::fuzz_target;
use tmpl_engine::{Locator, Template};

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        let mut tpl = Template::new(Locator::new());
        let _ = tpl.parse("fuzz-template", source);
    }
});
