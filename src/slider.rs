// Slider view model - a bounded numeric control with its own readout text

/// Renders a raw slider value as the text shown next to it
pub type Formatter = fn(f64) -> String;

pub fn integer(value: f64) -> String {
    format!("{:.0}", value)
}

/// Air time slider stores tenths of a second
pub fn tenths(value: f64) -> String {
    format!("{:.1}", scaled_tenths(value))
}

pub fn scaled_tenths(value: f64) -> f64 {
    value / 10.0
}

pub fn three_decimals(value: f64) -> String {
    format!("{:.3}", value)
}

#[derive(Debug, Clone)]
pub struct Slider {
    pub id: &'static str,
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
    value: f64,
    formatter: Formatter,
}

impl Slider {
    pub fn new(
        id: &'static str,
        label: &'static str,
        (min, max, step): (f64, f64, f64),
        default: f64,
        formatter: Formatter,
    ) -> Self {
        let mut slider = Slider {
            id,
            label,
            min,
            max,
            step,
            default,
            value: default,
            formatter,
        };
        slider.set(default);
        slider
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value, clamped to the slider's range. Returns the stored value.
    pub fn set(&mut self, value: f64) -> f64 {
        self.value = if value.is_nan() { self.min } else { value.clamp(self.min, self.max) };
        self.value
    }

    /// Move by whole steps, snapping onto the step grid to avoid float drift
    pub fn nudge(&mut self, steps: i32) -> f64 {
        let target = self.value + steps as f64 * self.step;
        let snapped = self.min + ((target - self.min) / self.step).round() * self.step;
        // Trim representation noise such as 0.30000000000000004
        let decimals = decimals_of(self.step);
        let factor = 10f64.powi(decimals);
        self.set((snapped * factor).round() / factor)
    }

    pub fn readout(&self) -> String {
        (self.formatter)(self.value)
    }

    /// Position within the range, 0.0 to 1.0
    pub fn fraction(&self) -> f64 {
        if self.max <= self.min {
            return 0.0;
        }
        (self.value - self.min) / (self.max - self.min)
    }
}

fn decimals_of(step: f64) -> i32 {
    let mut decimals = 0;
    let mut scaled = step;
    while decimals < 6 && (scaled - scaled.round()).abs() > 1e-9 {
        scaled *= 10.0;
        decimals += 1;
    }
    decimals
}
