use crate::Result;

use crate::cli::OutputFormat;
use crate::transcribe::TranscriptionResult;

/// Render a transcription result in the requested format
pub fn render(result: &TranscriptionResult, format: &OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Text => result.transcript_url.clone(),
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
    };

    Ok(content)
}

/// Print transcription result to stdout
pub fn print_to_console(result: &TranscriptionResult, format: &OutputFormat) -> Result<()> {
    println!("{}", render(result, format)?);
    Ok(())
}
