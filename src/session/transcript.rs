/// Ordered concatenation of transcript fragments for one direction.
///
/// Fragments accumulate until a turn-complete signal resets the
/// accumulator; fragments arriving after a reset start a fresh turn.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    text: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    pub fn reset(&mut self) {
        self.text.clear();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
