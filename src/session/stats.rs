use crate::types::events::event::Usage;

/// Token usage summed over every completed response of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    responses: u64,
    total_tokens: u64,
    input_tokens: u64,
    output_tokens: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn update_usage(&mut self, usage: &Usage) {
        self.responses += 1;
        self.total_tokens += usage.total_tokens();
        self.input_tokens += usage.input_tokens();
        self.output_tokens += usage.output_tokens();
    }

    pub fn responses(&self) -> u64 {
        self.responses
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_accumulates_across_responses() {
        let mut stats = Stats::new();
        stats.update_usage(&Usage::new(30, 10, 20));
        stats.update_usage(&Usage::new(5, 4, 1));

        assert_eq!(stats.responses(), 2);
        assert_eq!(stats.total_tokens(), 35);
        assert_eq!(stats.input_tokens(), 14);
        assert_eq!(stats.output_tokens(), 21);
    }
}
