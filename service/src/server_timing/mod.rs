use crate::server_timing::timing::Timing;
use std::fmt::{Display, Formatter};

pub mod timing;

/// Value of a `Server-Timing` header: one metric per timed step.
#[derive(Debug, Clone, Default)]
pub struct ServerTiming {
    timings: Vec<Timing>,
}

impl Display for ServerTiming {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.timings.iter().map(Timing::to_string).collect();
        write!(f, "{}", rendered.join(", "))
    }
}

impl ServerTiming {
    pub fn new(timings: Vec<Timing>) -> ServerTiming {
        ServerTiming { timings }
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }
}
