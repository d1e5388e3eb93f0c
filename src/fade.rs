/// Triangle wave over `0..range`: climbs one step at a time to `range - 1`, then back down.
#[derive(Debug, Clone)]
pub struct Fade {
    value: u32,
    rising: bool,
    top: u32,
}

impl Fade {
    pub fn new(range: u32) -> Self {
        Fade {
            value: 0,
            rising: true,
            top: range.saturating_sub(1),
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Advances one step and returns the new value.
    pub fn step(&mut self) -> u32 {
        if self.top == 0 {
            return 0;
        }
        if self.value == 0 {
            self.rising = true;
        } else if self.value == self.top {
            self.rising = false;
        }
        if self.rising {
            self.value += 1;
        } else {
            self.value -= 1;
        }
        self.value
    }
}
