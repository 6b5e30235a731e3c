/// Render an error and its cause chain on one line.
pub(crate) fn display_chain(err: &anyhow::Error) -> String {
    err.chain()
        .skip(1)
        .fold(err.to_string(), |acc, cause| format!("{acc}: {cause}"))
}
