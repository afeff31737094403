// Scale model: domain values to pixels, ticks, and tick labels
use super::options::GraphOptions;
use serde::Serialize;

/// Smallest value a logarithmic axis may show.
pub const LOG_FLOOR: f64 = 1e-6;

/// Pixels per y-axis tick.
pub const Y_TICK_SPACING: f64 = 40.0;

const PREFIX_SYMBOLS: [&str; 17] = [
    "y", "z", "a", "f", "p", "n", "μ", "m", "", "k", "M", "G", "T", "P", "E", "Z", "Y",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: [f64; 2],
    range: [f64; 2],
    clamp: bool,
}

impl LinearScale {
    pub fn new(domain: [f64; 2], range: [f64; 2]) -> Self {
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self {
            domain: [finite(domain[0]), finite(domain[1])],
            range,
            clamp: false,
        }
    }

    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    pub fn domain(&self) -> [f64; 2] {
        self.domain
    }

    /// Extends the domain outward to round values.
    pub fn nice(mut self) -> Self {
        let (lo, hi, reversed) = ordered(self.domain);
        let span = hi - lo;
        if span > 0.0 {
            let step = 10f64.powf((span.log10()).round() - 1.0);
            let nice = [(lo / step).floor() * step, (hi / step).ceil() * step];
            self.domain = if reversed { [nice[1], nice[0]] } else { nice };
        }
        self
    }

    pub fn map(&self, value: f64) -> f64 {
        let [d0, d1] = self.domain;
        let span = d1 - d0;
        if span == 0.0 || !value.is_finite() {
            return self.range[0];
        }
        let mut t = (value - d0) / span;
        if self.clamp {
            t = t.clamp(0.0, 1.0);
        }
        self.range[0] + t * (self.range[1] - self.range[0])
    }

    pub fn invert(&self, position: f64) -> f64 {
        let [r0, r1] = self.range;
        let span = r1 - r0;
        if span == 0.0 {
            return self.domain[0];
        }
        let mut t = (position - r0) / span;
        if self.clamp {
            t = t.clamp(0.0, 1.0);
        }
        self.domain[0] + t * (self.domain[1] - self.domain[0])
    }

    /// Roughly `count` evenly spaced round values inside the domain.
    pub fn ticks(&self, count: f64) -> Vec<f64> {
        let Some((start, stop, step)) = tick_range(self.domain, count) else {
            return vec![self.domain[0]];
        };
        let precision = 10f64.powi(decimals(step) as i32);
        let mut ticks = Vec::new();
        let mut i = 0.0;
        loop {
            let value = ((start + step * i) * precision).round() / precision;
            if value > stop {
                break;
            }
            ticks.push(value);
            i += 1.0;
        }
        ticks
    }

    /// Fixed-point formatter with enough decimals to tell the ticks apart.
    pub fn tick_format(&self, count: f64) -> FixedFormat {
        let decimals = tick_range(self.domain, count)
            .map(|(_, _, step)| decimals(step))
            .unwrap_or(0);
        FixedFormat { decimals }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogScale {
    domain: [f64; 2],
    range: [f64; 2],
    clamp: bool,
}

impl LogScale {
    /// Non-positive or non-finite bounds are raised to `LOG_FLOOR`.
    pub fn new(domain: [f64; 2], range: [f64; 2]) -> Self {
        let floor = |v: f64| if v.is_finite() { v.max(LOG_FLOOR) } else { LOG_FLOOR };
        Self {
            domain: [floor(domain[0]), floor(domain[1])],
            range,
            clamp: false,
        }
    }

    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    pub fn domain(&self) -> [f64; 2] {
        self.domain
    }

    /// Extends the domain to whole decades.
    pub fn nice(mut self) -> Self {
        let (lo, hi, reversed) = ordered(self.domain);
        let nice = [
            10f64.powi(lo.log10().floor() as i32),
            10f64.powi(hi.log10().ceil() as i32),
        ];
        self.domain = if reversed { [nice[1], nice[0]] } else { nice };
        self
    }

    pub fn map(&self, value: f64) -> f64 {
        let [l0, l1] = [self.domain[0].log10(), self.domain[1].log10()];
        let span = l1 - l0;
        if span == 0.0 {
            return self.range[0];
        }
        let value = if value.is_finite() && value > 0.0 {
            value
        } else {
            LOG_FLOOR
        };
        let mut t = (value.log10() - l0) / span;
        if self.clamp {
            t = t.clamp(0.0, 1.0);
        }
        self.range[0] + t * (self.range[1] - self.range[0])
    }

    /// 1..9 times each power of ten inside the domain.
    pub fn ticks(&self) -> Vec<f64> {
        let (lo, hi, _) = ordered(self.domain);
        let first = lo.log10().floor() as i32;
        let last = hi.log10().ceil() as i32;

        let mut ticks = Vec::new();
        for exponent in first..last {
            let decade = 10f64.powi(exponent);
            ticks.extend((1..10).map(|k| decade * k as f64));
        }
        ticks.push(10f64.powi(last));
        ticks.retain(|t| *t >= lo && *t <= hi);
        ticks
    }

    /// Labels such as `2e+2`.
    pub fn format_tick(value: f64) -> String {
        let formatted = format!("{value:.0e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        }
    }
}

/// A decimal magnitude prefix such as `k` (10^3) or `μ` (10^-6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiPrefix {
    pub symbol: &'static str,
    pub exponent: i32,
}

impl SiPrefix {
    pub fn for_value(value: f64) -> Self {
        let mut exponent = 0;
        let value = value.abs();
        if value != 0.0 && value.is_finite() {
            let digits = 1 + (1e-12 + value.log10()).floor() as i32;
            let shifted = if digits <= 0 { digits + 1 } else { digits - 1 };
            exponent = ((shifted as f64 / 3.0).floor() as i32 * 3).clamp(-24, 24);
        }
        Self {
            symbol: PREFIX_SYMBOLS[(8 + exponent / 3) as usize],
            exponent,
        }
    }

    pub fn scale(&self, value: f64) -> f64 {
        if self.exponent < 0 {
            value * 10f64.powi(-self.exponent)
        } else {
            value / 10f64.powi(self.exponent)
        }
    }
}

/// `,.Nf`-style formatting: grouped thousands, fixed decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedFormat {
    pub decimals: usize,
}

impl FixedFormat {
    pub fn format(&self, value: f64) -> String {
        let body = format!("{:.*}", self.decimals, value.abs());
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (body.as_str(), None),
        };

        let mut grouped = String::with_capacity(body.len() + int_part.len() / 3);
        for (i, c) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        if let Some(frac) = frac_part {
            grouped.push('.');
            grouped.push_str(frac);
        }

        if value < 0.0 {
            format!("-{grouped}")
        } else {
            grouped
        }
    }
}

/// Linear-axis labels in a common SI unit, e.g. `1.5k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefixedFormat {
    prefix: SiPrefix,
    fixed: FixedFormat,
}

impl PrefixedFormat {
    pub fn new(domain: [f64; 2], count: f64) -> Self {
        let prefix = SiPrefix::for_value((-domain[0]).max(domain[1]));
        let scaled = [prefix.scale(domain[0]), prefix.scale(domain[1])];
        let fixed = LinearScale::new(scaled, [0.0, 1.0]).tick_format(count);
        Self { prefix, fixed }
    }

    pub fn format(&self, value: f64) -> String {
        if value == 0.0 {
            return "0".to_string();
        }
        format!("{}{}", self.fixed.format(self.prefix.scale(value)), self.prefix.symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub value: f64,
    pub position: f64,
    pub label: String,
}

/// The value axis of a chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum YScale {
    Linear(LinearScale),
    Log(LogScale),
}

impl YScale {
    /// Builds the axis for the data extent `[min, max]` on a plot `height` pixels tall.
    pub fn for_extent(min: f64, max: f64, options: &GraphOptions, height: f64) -> Self {
        if options.y_axis_log_scale {
            let lower = LOG_FLOOR.max(finite_or(min, LOG_FLOOR));
            let upper = LOG_FLOOR.max(finite_or(max, LOG_FLOOR));
            let scale = LogScale::new([lower, options.y_axis_clamp.unwrap_or(upper)], [height, 0.0])
                .with_clamp(true)
                .nice();
            YScale::Log(scale)
        } else {
            let lower = 0f64.min(finite_or(min, 0.0));
            let upper = 0f64.max(finite_or(max, 0.0));
            let scale = LinearScale::new([lower, options.y_axis_clamp.unwrap_or(upper)], [height, 0.0])
                .with_clamp(options.y_axis_clamp.is_some())
                .nice();
            YScale::Linear(scale)
        }
    }

    pub fn domain(&self) -> [f64; 2] {
        match self {
            YScale::Linear(s) => s.domain(),
            YScale::Log(s) => s.domain(),
        }
    }

    pub fn map(&self, value: f64) -> f64 {
        match self {
            YScale::Linear(s) => s.map(value),
            YScale::Log(s) => s.map(value),
        }
    }

    pub fn ticks(&self, height: f64) -> Vec<Tick> {
        let count = height / Y_TICK_SPACING;
        match self {
            YScale::Linear(scale) => {
                let format = PrefixedFormat::new(scale.domain(), count);
                scale
                    .ticks(count)
                    .into_iter()
                    .map(|value| Tick {
                        value,
                        position: scale.map(value),
                        label: format.format(value),
                    })
                    .collect()
            }
            YScale::Log(scale) => scale
                .ticks()
                .into_iter()
                .map(|value| Tick {
                    value,
                    position: scale.map(value),
                    label: LogScale::format_tick(value),
                })
                .collect(),
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

fn ordered(domain: [f64; 2]) -> (f64, f64, bool) {
    if domain[1] < domain[0] {
        (domain[1], domain[0], true)
    } else {
        (domain[0], domain[1], false)
    }
}

/// `(first, last, step)` of the ticks for `domain`, or `None` for an empty span.
fn tick_range(domain: [f64; 2], count: f64) -> Option<(f64, f64, f64)> {
    let (lo, hi, _) = ordered(domain);
    let span = hi - lo;
    if !(span > 0.0) || !span.is_finite() || !(count > 0.0) {
        return None;
    }

    let mut step = 10f64.powf((span / count).log10().floor());
    let err = count / span * step;
    if err <= 0.15 {
        step *= 10.0;
    } else if err <= 0.35 {
        step *= 5.0;
    } else if err <= 0.75 {
        step *= 2.0;
    }

    let start = (lo / step).ceil() * step;
    let stop = (hi / step).floor() * step + step * 0.5;
    Some((start, stop, step))
}

fn decimals(step: f64) -> usize {
    (-(step.log10() + 0.01).floor()).max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_nice_and_map() {
        let scale = LinearScale::new([0.0, 87.0], [200.0, 0.0]).nice();
        assert_eq!(scale.domain(), [0.0, 90.0]);
        assert_eq!(scale.map(0.0), 200.0);
        assert_eq!(scale.map(90.0), 0.0);
        assert_eq!(scale.map(45.0), 100.0);
        assert_eq!(scale.invert(100.0), 45.0);
    }

    #[test]
    fn test_linear_clamp() {
        let scale = LinearScale::new([0.0, 10.0], [100.0, 0.0]).with_clamp(true);
        assert_eq!(scale.map(20.0), 0.0);
        assert_eq!(scale.map(-5.0), 100.0);
    }

    #[test]
    fn test_linear_ticks() {
        let scale = LinearScale::new([0.0, 100.0], [0.0, 1.0]);
        assert_eq!(
            scale.ticks(5.0),
            vec![0.0, 20.0, 40.0, 60.0, 80.0, 100.0]
        );
        assert_eq!(
            LinearScale::new([0.0, 1.0], [0.0, 1.0]).ticks(5.0),
            vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]
        );
    }

    #[test]
    fn test_degenerate_linear_scale() {
        let scale = LinearScale::new([0.0, 0.0], [100.0, 0.0]).nice();
        assert_eq!(scale.domain(), [0.0, 0.0]);
        assert_eq!(scale.map(5.0), 100.0);
        assert_eq!(scale.ticks(3.0), vec![0.0]);
    }

    #[test]
    fn test_si_prefix() {
        assert_eq!(SiPrefix::for_value(999.0).symbol, "");
        assert_eq!(SiPrefix::for_value(1000.0).symbol, "k");
        assert_eq!(SiPrefix::for_value(2.5e6).symbol, "M");
        assert_eq!(SiPrefix::for_value(0.001).symbol, "m");
        assert_eq!(SiPrefix::for_value(0.0).symbol, "");
        assert_eq!(SiPrefix::for_value(1500.0).scale(1500.0), 1.5);
    }

    #[test]
    fn test_fixed_format_groups_thousands() {
        let format = FixedFormat { decimals: 1 };
        assert_eq!(format.format(1234567.26), "1,234,567.3");
        assert_eq!(format.format(-12.0), "-12.0");
        assert_eq!(FixedFormat { decimals: 0 }.format(100.0), "100");
    }

    #[test]
    fn test_prefixed_tick_labels() {
        let format = PrefixedFormat::new([0.0, 2000.0], 10.0);
        assert_eq!(format.format(0.0), "0");
        assert_eq!(format.format(1500.0), "1.5k");
        assert_eq!(format.format(2000.0), "2.0k");

        let coarse = PrefixedFormat::new([0.0, 5000.0], 5.0);
        assert_eq!(coarse.format(3000.0), "3k");
    }

    #[test]
    fn test_linear_y_axis_includes_zero() {
        let scale = YScale::for_extent(20.0, 87.0, &GraphOptions::default(), 200.0);
        assert_eq!(scale.domain(), [0.0, 90.0]);

        let negative = YScale::for_extent(-13.0, -2.0, &GraphOptions::default(), 200.0);
        assert_eq!(negative.domain(), [-13.0, 0.0]);
    }

    #[test]
    fn test_clamped_linear_axis() {
        let options = GraphOptions {
            y_axis_clamp: Some(50.0),
            ..Default::default()
        };
        let scale = YScale::for_extent(0.0, 500.0, &options, 100.0);
        assert_eq!(scale.domain(), [0.0, 50.0]);
        assert_eq!(scale.map(500.0), 0.0);
    }

    #[test]
    fn test_log_axis_floors_minimum() {
        let options = GraphOptions {
            y_axis_log_scale: true,
            ..Default::default()
        };
        let scale = YScale::for_extent(0.0, 100.0, &options, 300.0);
        let [lo, hi] = scale.domain();
        assert!((lo - 1e-6).abs() < 1e-18);
        assert!((hi - 100.0).abs() < 1e-9);

        let ticks = scale.ticks(300.0);
        assert!(!ticks.is_empty());
        assert!(ticks.iter().all(|t| t.value.is_finite() && t.position.is_finite()));
        assert_eq!(ticks.last().unwrap().label, "1e+2");
        assert!(scale.map(0.0).is_finite());
    }

    #[test]
    fn test_empty_extent_is_finite() {
        for log in [false, true] {
            let options = GraphOptions {
                y_axis_log_scale: log,
                ..Default::default()
            };
            let scale = YScale::for_extent(f64::INFINITY, f64::NEG_INFINITY, &options, 100.0);
            assert!(scale.domain().iter().all(|d| d.is_finite()));
            assert!(scale.map(1.0).is_finite());
            assert!(scale.ticks(100.0).iter().all(|t| t.position.is_finite()));
        }
    }

    #[test]
    fn test_log_tick_format() {
        assert_eq!(LogScale::format_tick(200.0), "2e+2");
        assert_eq!(LogScale::format_tick(1e-6), "1e-6");
        assert_eq!(LogScale::format_tick(1.0), "1e+0");
    }
}
