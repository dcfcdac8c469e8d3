mod harness;

#[allow(unused_imports)]
pub use harness::{spawn_scripted_judge, JudgeHarness, TemplateCompiler};
