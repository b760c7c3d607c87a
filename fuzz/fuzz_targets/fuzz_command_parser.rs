#![no_main]

use libfuzzer_sys::fuzz_target;
use paneflip::protocol::{Request, parse_c_integer, parse_line};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    for line in text.split('\n') {
        let Ok(cmd) = parse_line(line) else {
            continue;
        };
        assert!(!cmd.target.is_empty(), "empty target accepted");
        assert!(!cmd.target.contains(':'), "target spans a colon");
        assert!(
            !cmd.action.bytes().any(|b| b.is_ascii_whitespace()),
            "action holds whitespace"
        );

        // Semantic validation must reject, never panic.
        let _ = Request::from_command(&cmd);
        for arg in &cmd.args {
            let _ = parse_c_integer(arg);
        }
    }
});
