use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub use serde_with::{serde_as, DeserializeAs, SerializeAs};

/// 人类可读的时长
///
/// 配置中写作 "100ms"、"3s"、"1m30s"，配合 `#[serde_as(as = "HumanDur")]` 使用
pub struct HumanDur;

impl SerializeAs<Duration> for HumanDur {
    fn serialize_as<S>(source: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*source))
    }
}

impl<'de> DeserializeAs<'de, Duration> for HumanDur {
    fn deserialize_as<D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

fn unit_nanos(unit: &str) -> Option<f64> {
    let nanos = match unit {
        "ns" => 1.0,
        "us" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60.0 * 1e9,
        "h" => 3600.0 * 1e9,
        "d" => 86400.0 * 1e9,
        _ => return None,
    };
    Some(nanos)
}

/// 解析时长，如 "1h30m"、"1.5s"、"250ms"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_ascii_lowercase();
    if s.is_empty() {
        return Err(anyhow!("空字符串"));
    }

    let mut total_nanos = 0f64;
    let mut rest = s.as_str();
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_end == 0 {
            return Err(anyhow!("期望数字: {}", s));
        }
        let value: f64 = rest[..num_end]
            .parse()
            .map_err(|_| anyhow!("无效数字: {}", &rest[..num_end]))?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        if unit_end == 0 {
            return Err(anyhow!("缺少时间单位: {}", s));
        }
        let unit = &rest[..unit_end];
        let scale = unit_nanos(unit).ok_or_else(|| anyhow!("不支持的时间单位: {}", unit))?;
        rest = &rest[unit_end..];

        total_nanos += value * scale;
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// 格式化时长，整秒部分按 d/h/m/s 拆分，不足一秒的部分用最合适的单位
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if secs == 0 && nanos == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    let mut remaining = secs;
    for (unit, size) in [("d", 86400), ("h", 3600), ("m", 60)] {
        if remaining >= size {
            out.push_str(&format!("{}{}", remaining / size, unit));
            remaining %= size;
        }
    }
    if remaining > 0 {
        out.push_str(&format!("{}s", remaining));
    }

    if nanos > 0 {
        if nanos % 1_000_000 == 0 {
            out.push_str(&format!("{}ms", nanos / 1_000_000));
        } else if nanos % 1_000 == 0 {
            out.push_str(&format!("{}us", nanos / 1_000));
        } else {
            out.push_str(&format!("{}ns", nanos));
        }
    }
    out
}
