use anyhow::Result;
use rand::Rng;
use serde::Serialize;
use std::fmt;

use crate::pipeline::{Collect, PipelineBuilder, PipelineReport};
use crate::report::RunReport;

/// Classful IPv4 address class, by first octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IpClass {
    A,
    B,
    C,
    D,
    E,
}

impl IpClass {
    /// Classes A, B and C: the ones that carry ordinary unicast traffic.
    pub fn is_unicast(self) -> bool {
        matches!(self, IpClass::A | IpClass::B | IpClass::C)
    }
}

impl fmt::Display for IpClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            IpClass::A => "A",
            IpClass::B => "B",
            IpClass::C => "C",
            IpClass::D => "D",
            IpClass::E => "E",
        };
        f.write_str(letter)
    }
}

/// Class of a dotted-quad address; `None` for loopback (127), 0, 255 and
/// anything that does not start with a number.
pub fn classify(ip: &str) -> Option<IpClass> {
    let first: u16 = ip.split('.').next()?.trim().parse().ok()?;
    match first {
        1..=126 => Some(IpClass::A),
        128..=191 => Some(IpClass::B),
        192..=223 => Some(IpClass::C),
        224..=239 => Some(IpClass::D),
        240..=254 => Some(IpClass::E),
        _ => None,
    }
}

/// Random address with every octet in 1..=254.
pub fn random_ip<R: Rng>(rng: &mut R) -> String {
    let octets: [u8; 4] = std::array::from_fn(|_| rng.random_range(1..=254));
    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedIp {
    pub ip: String,
    pub class: IpClass,
}

impl fmt::Display for ClassifiedIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> class {}", self.ip, self.class)
    }
}

/// generator → class-filter → printer, over `count` random addresses.
pub fn run(count: usize) -> Result<PipelineReport<Vec<ClassifiedIp>>> {
    tracing::info!(count, "classifying random addresses");
    pipeline(move || {
        let mut rng = rand::rng();
        (0..count).map(|_| random_ip(&mut rng)).collect()
    })
}

/// Same pipeline over a fixed list of addresses.
pub fn run_on(addresses: Vec<String>) -> Result<PipelineReport<Vec<ClassifiedIp>>> {
    pipeline(move || addresses)
}

fn pipeline<G>(generate: G) -> Result<PipelineReport<Vec<ClassifiedIp>>>
where
    G: FnOnce() -> Vec<String> + Send + 'static,
{
    PipelineBuilder::source("generator", move |out| {
        for ip in generate() {
            out.send(ip)?;
        }
        Ok(())
    })
    .stage("class-filter", |ip: String| {
        let class = classify(&ip)?;
        class.is_unicast().then_some(ClassifiedIp { ip, class })
    })
    .sink("printer", Collect::new())
    .run()
}

pub fn report(run: &PipelineReport<Vec<ClassifiedIp>>) -> RunReport {
    let mut report = RunReport::new("IP classes");
    report.push_stages(&run.stages);
    let forwarded = run.output.as_ref().map_or(0, Vec::len);
    for item in run.output.iter().flatten() {
        report.push_item(item);
    }
    report.push_summary("addresses kept", forwarded);
    report.finish(run.total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_boundaries() {
        assert_eq!(classify("1.2.3.4"), Some(IpClass::A));
        assert_eq!(classify("126.0.0.1"), Some(IpClass::A));
        assert_eq!(classify("127.0.0.1"), None);
        assert_eq!(classify("128.1.1.1"), Some(IpClass::B));
        assert_eq!(classify("191.1.1.1"), Some(IpClass::B));
        assert_eq!(classify("192.168.0.1"), Some(IpClass::C));
        assert_eq!(classify("223.1.1.1"), Some(IpClass::C));
        assert_eq!(classify("224.0.0.1"), Some(IpClass::D));
        assert_eq!(classify("240.0.0.1"), Some(IpClass::E));
        assert_eq!(classify("255.255.255.255"), None);
        assert_eq!(classify("0.1.1.1"), None);
        assert_eq!(classify("not-an-ip"), None);
    }

    #[test]
    fn test_random_octets_in_range() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let ip = random_ip(&mut rng);
            let octets: Vec<u16> = ip.split('.').map(|o| o.parse().unwrap()).collect();
            assert_eq!(octets.len(), 4);
            assert!(octets.iter().all(|o| (1..=254).contains(o)));
        }
    }

    #[test]
    fn test_pipeline_keeps_unicast_in_order() {
        let addresses = ["10.0.0.1", "224.0.0.5", "172.16.0.1", "127.0.0.1", "200.1.1.1", "250.0.0.1"]
            .map(String::from)
            .to_vec();
        let run = run_on(addresses).unwrap();

        let kept: Vec<String> = run.output.clone().unwrap().into_iter().map(|c| c.ip).collect();
        assert_eq!(kept, vec!["10.0.0.1", "172.16.0.1", "200.1.1.1"]);

        let filter = run.stage("class-filter").unwrap();
        assert_eq!(filter.received, 6);
        assert_eq!(filter.forwarded, 3);
        assert!(filter.sentinel_seen && filter.sentinel_forwarded);

        let report = report(&run);
        assert_eq!(report.items[0], "10.0.0.1 -> class A");
        assert_eq!(report.stages.len(), 3);
    }

    #[test]
    fn test_random_run_sends_count() {
        let run = run(25).unwrap();
        assert_eq!(run.stage("generator").unwrap().forwarded, 25);
        assert_eq!(run.stage("class-filter").unwrap().received, 25);
        assert!(run.errors().next().is_none());
    }
}
