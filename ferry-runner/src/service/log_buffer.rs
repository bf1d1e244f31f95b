//! Log buffer
//!
//! Collects the textual output of one job execution. The buffer is owned by
//! the execution that fills it and handed over as a single string once the
//! execution finishes, so the job record receives its logs in one write.

/// Accumulates command banners and raw process output
#[derive(Debug, Default)]
pub struct LogBuffer {
    text: String,
}

impl LogBuffer {
    /// Creates an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line, adding the trailing newline
    pub fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    /// Appends raw process output
    ///
    /// Invalid UTF-8 is replaced rather than rejected; build tools are not
    /// always careful about their encoding.
    pub fn push_output(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.text.push_str(&String::from_utf8_lossy(bytes));
    }

    /// Consumes the buffer, returning everything collected
    pub fn into_string(self) -> String {
        self.text
    }
}
