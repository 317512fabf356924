use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub use serde_with::{serde_as, DeserializeAs, SerializeAs};

/// Duration 的人性化格式化器
///
/// 支持格式: "500ms", "3s", "2m", "1h", "1h30m45s", "1.5s"
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

/// 解析时间字符串: "1h30m45s" -> Duration
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(anyhow!("空字符串"));
    }

    let mut total = Duration::ZERO;
    let mut rest = s.as_str();

    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(anyhow!("期望数字: {}", rest));
        }
        let (num_str, tail) = rest.split_at(num_len);
        let value: f64 = num_str
            .parse()
            .map_err(|_| anyhow!("无效数字: {}", num_str))?;

        let unit_len = tail
            .find(|c: char| !c.is_alphabetic())
            .unwrap_or(tail.len());
        if unit_len == 0 {
            return Err(anyhow!("缺少时间单位: {}", s));
        }
        let (unit, tail) = tail.split_at(unit_len);

        let nanos_per_unit: u64 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3600 * 1_000_000_000,
            "d" => 86400 * 1_000_000_000,
            _ => return Err(anyhow!("不支持的时间单位: {}", unit)),
        };

        total += Duration::from_nanos((value * nanos_per_unit as f64).round() as u64);
        rest = tail;
    }

    Ok(total)
}

/// Duration 格式化为字符串: Duration -> "1h30m45s"
///
/// 带毫秒的时长统一输出为毫秒，保证 parse/format 可以互逆。
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }

    let nanos = duration.subsec_nanos();
    if nanos % 1_000_000 != 0 {
        return format!("{}ns", duration.as_nanos());
    }
    if nanos != 0 {
        return format!("{}ms", duration.as_millis());
    }

    let mut remaining = duration.as_secs();
    let mut out = String::new();
    for (unit, size) in [("d", 86400), ("h", 3600), ("m", 60), ("s", 1)] {
        if remaining >= size {
            out.push_str(&format!("{}{}", remaining / size, unit));
            remaining %= size;
        }
    }
    out
}
