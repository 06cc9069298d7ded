use std::collections::HashMap;

/// Assigns a small ID to every distinct ordered sequence of stops. Trips sharing a sequence share
/// the ID, which keys cached geometry and generated shapes.
#[derive(Default)]
pub struct StopPatterns {
    // Keyed by the sequence itself rather than a joined string, so no stop ID can collide
    ids: HashMap<Vec<String>, i32>,
}

impl StopPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, stop_ids: &[String]) -> i32 {
        if let Some(id) = self.ids.get(stop_ids) {
            return *id;
        }
        let id = self.ids.len() as i32;
        self.ids.insert(stop_ids.to_vec(), id);
        id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}
