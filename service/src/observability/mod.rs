use hyper::HeaderMap;
use opentelemetry::propagation::Extractor;
use opentelemetry::Context;

pub struct HyperHeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HyperHeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Remote trace context carried by an incoming request, if any.
pub fn remote_context(headers: &HeaderMap) -> Context {
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.extract(&HyperHeaderExtractor(headers))
    })
}
