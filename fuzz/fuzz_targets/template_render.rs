#![no_main]

use libfuzzer_sys::fuzz_target;
use tmpl_engine::{EvalEnv, Locator, Template};
use tmpl_stdlib::{DirectoryNamespaceLoader, NamespaceConfig};

fuzz_target!(|data: &[u8]| {
    let source = match std::str::from_utf8(data) {
        Ok(src) => src,
        Err(_) => return,
    };

    let mut tpl = Template::new(Locator::new());
    if tpl.parse("fuzz-template-render", source).is_ok() {
        let namespaces = DirectoryNamespaceLoader::new(NamespaceConfig::default());
        let mut sink = Vec::new();
        let mut env = EvalEnv::new(&mut sink, &namespaces);
        let mut out = Vec::new();
        let _ = tpl.expand(None, &mut env, &mut out);
    }
});
