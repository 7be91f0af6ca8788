use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Timing {
    pub name: String,
    pub duration: Duration,
    pub description: Option<String>,
}

impl Display for Timing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let millis = self.duration.as_secs_f64() * 1000.0;
        match &self.description {
            Some(desc) => write!(f, "{};desc=\"{}\";dur={:.1}", self.name, desc, millis),
            None => write!(f, "{};dur={:.1}", self.name, millis),
        }
    }
}

impl Timing {
    pub fn new(name: &str, duration: Duration, description: Option<String>) -> Timing {
        Timing {
            name: name.to_string(),
            duration,
            description,
        }
    }
}
