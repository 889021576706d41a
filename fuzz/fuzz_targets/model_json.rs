#![no_main]
use engine::AnalyzerConfig;
use ir::ProgramModel;
use libfuzzer_sys::fuzz_target;

// Any model that parses and validates must analyse without panicking.
fuzz_target!(|data: &[u8]| {
    if let Ok(model) = serde_json::from_slice::<ProgramModel>(data) {
        if model.validate().is_empty() {
            let _ = engine::analyze_program(&model, &AnalyzerConfig::default());
        }
    }
});
