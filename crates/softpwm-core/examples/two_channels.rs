use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use softpwm_core::{Level, Pin, PinSink, PwmEngine};

/// Counts rising edges per pin instead of touching real hardware.
struct EdgeCounter {
    rising: [AtomicUsize; 256],
}

impl PinSink for EdgeCounter {
    fn configure_output(&self, pin: Pin) {
        println!("pin {} configured as output", pin);
    }

    fn set_level(&self, pin: Pin, level: Level) {
        if level == Level::High {
            self.rising[pin as usize].fetch_add(1, Ordering::Relaxed);
        }
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

fn main() -> Result<(), softpwm_core::PwmError> {
    let sink = Arc::new(EdgeCounter {
        rising: std::array::from_fn(|_| AtomicUsize::new(0)),
    });
    let mut engine = PwmEngine::new(Arc::clone(&sink));
    engine.set_frequency(200)?;

    // Channel 0 at 25%, channel 1 at 75%
    for (channel, pins, data) in [(0, [12, 13], 256), (1, [18, 19], 768)] {
        engine.create_channel(channel)?;
        engine.set_range(channel, 1024);
        engine.set_data(channel, data);
        for pin in pins {
            engine.assign_pin(channel, pin)?;
        }
    }

    engine.start_all_channels()?;
    thread::sleep(Duration::from_millis(500));

    // Silence channel 0; its pins stop producing rising edges.
    engine.set_data(0, 0);
    thread::sleep(Duration::from_millis(250));
    engine.close();

    for pin in [12, 13, 18, 19] {
        println!(
            "pin {}: {} rising edges",
            pin,
            sink.rising[pin].load(Ordering::Relaxed)
        );
    }
    Ok(())
}
