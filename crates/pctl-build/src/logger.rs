use std::sync::{Mutex, PoisonError};

use colored::Colorize;
use serde_json::Value;

/// Sink for build output.
///
/// Shared by every concurrent service task: implementations must be
/// safe to call concurrently and must emit whole lines, so one
/// service's build log never interleaves mid-line with another's.
pub trait BuildLogger: Send + Sync {
    /// A line belonging to one service's build log.
    fn service(&self, service_name: &str, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Terminal logger with a badge prefix.
///
/// Docker's build endpoints emit line-delimited JSON; [`StyledLogger`]
/// unwraps those into readable text before printing. Construct one per
/// run and pass it in — there is no global logger state.
pub struct StyledLogger {
    prefix: String,
    out: Mutex<()>,
}

impl StyledLogger {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            out: Mutex::new(()),
        }
    }

    fn badge(&self) -> String {
        self.prefix.as_str().bold().magenta().to_string()
    }
}

impl BuildLogger for StyledLogger {
    fn service(&self, service_name: &str, message: &str) {
        let Some(text) = clean_docker_line(message) else {
            return;
        };
        let _guard = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        println!(
            "{} {} {}",
            self.badge(),
            service_name.bold().cyan(),
            text
        );
    }

    fn info(&self, message: &str) {
        let _guard = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        println!("{} {}", self.badge(), message.blue());
    }

    fn warn(&self, message: &str) {
        let text = format!("WARN: {message}");
        let _guard = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        println!("{} {}", self.badge(), text.as_str().yellow());
    }

    fn error(&self, message: &str) {
        let text = format!("ERROR: {message}");
        let _guard = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        println!("{} {}", self.badge(), text.as_str().red());
    }
}

/// Turn a docker-build output line into display text.
///
/// `None` means the line carries nothing worth printing (empty stream
/// fragments). Non-JSON lines pass through dimmed.
fn clean_docker_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if !line.starts_with('{') {
        return Some(line.dimmed().to_string());
    }

    let Ok(value) = serde_json::from_str::<Value>(line) else {
        return Some(line.dimmed().to_string());
    };

    if let Some(stream) = value.get("stream").and_then(Value::as_str) {
        let stream = stream.trim();
        if stream.is_empty() {
            return None;
        }
        if stream.starts_with("Step ")
            || stream.starts_with("Successfully")
            || stream.starts_with("---")
        {
            return Some(stream.to_owned());
        }
        return Some(stream.dimmed().to_string());
    }

    if let Some(message) = value
        .get("errorDetail")
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
    {
        if !message.is_empty() {
            return Some(message.red().to_string());
        }
    }

    if let Some(id) = value
        .get("aux")
        .and_then(|aux| aux.get("ID"))
        .and_then(Value::as_str)
    {
        if !id.is_empty() {
            let built = format!("Built {id}");
            return Some(built.as_str().green().to_string());
        }
    }

    Some(line.dimmed().to_string())
}

#[cfg(test)]
mod tests {
    use super::clean_docker_line;

    #[test]
    fn plain_text_passes_through() {
        let cleaned = clean_docker_line("#5 exporting layers").unwrap();
        assert!(cleaned.contains("#5 exporting layers"));
    }

    #[test]
    fn empty_stream_fragment_is_suppressed() {
        assert!(clean_docker_line(r#"{"stream": "\n"}"#).is_none());
        assert!(clean_docker_line("   ").is_none());
    }

    #[test]
    fn step_lines_are_unwrapped() {
        let cleaned = clean_docker_line(r#"{"stream": "Step 1/3 : FROM nginx\n"}"#).unwrap();
        assert_eq!(cleaned, "Step 1/3 : FROM nginx");
    }

    #[test]
    fn error_detail_is_surfaced() {
        let cleaned =
            clean_docker_line(r#"{"errorDetail": {"message": "no such file"}}"#).unwrap();
        assert!(cleaned.contains("no such file"));
    }

    #[test]
    fn aux_id_becomes_built_line() {
        let cleaned = clean_docker_line(r#"{"aux": {"ID": "sha256:abc"}}"#).unwrap();
        assert!(cleaned.contains("Built sha256:abc"));
    }
}
