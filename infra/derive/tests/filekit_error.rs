use std::borrow::Cow;

#[filekit_derive::filekit_error]
pub enum ProbeError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn missing_file() -> Result<Vec<u8>, ProbeError> {
    std::fs::read("/definitely/not/here.bin").context("Reading probe input")
}

#[test]
fn filekit_error_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/error_pass.rs");
}

#[test]
fn source_errors_pick_up_context() {
    let err = missing_file().expect_err("file must be missing");
    assert!(matches!(err, ProbeError::Io { context: Some(_), .. }));
    assert!(err.to_string().starts_with("IO error (Reading probe input): "));
}

#[test]
fn question_mark_converts_without_context() {
    fn inner() -> Result<(), ProbeError> {
        std::fs::read_dir("/definitely/not/here")?;
        Ok(())
    }

    let err = inner().expect_err("directory must be missing");
    assert!(matches!(err, ProbeError::Io { context: None, .. }));
}

#[test]
fn internal_accepts_plain_strings() {
    let err: ProbeError = "boom".into();
    assert_eq!(err.to_string(), "Internal error: boom");

    let err: Result<(), ProbeError> = Err(String::from("late").into());
    let err = err.context("while testing").expect_err("still an error");
    assert_eq!(err.to_string(), "Internal error (while testing): late");
}
