//! LoRa mesh routing node firmware binary.

#[cfg(feature = "esp32")]
fn main() {
    loramesh::ensure_esp_initialized();

    println!("=== loramesh node starting ===");

    use loramesh::lora::{calculate_airtime_us, DutyCycleLimiter, LoRaParams};
    use std::time::Duration;

    log::info!("logger initialized");

    // Demonstrate duty cycle limiter
    let duty_cycle = DutyCycleLimiter::new(1.0, Duration::from_secs(3600));
    let params = LoRaParams::default();

    println!(
        "Duty cycle budget: {} us ({:.2} seconds)",
        duty_cycle.budget(),
        duty_cycle.budget() as f64 / 1_000_000.0
    );

    let airtime = calculate_airtime_us(100, &params);
    println!(
        "100-byte packet airtime: {} us ({:.2} ms)",
        airtime,
        airtime as f64 / 1000.0
    );

    println!("Use the `node` binary to bring up a routing core on this radio.");
    loop {
        std::thread::sleep(Duration::from_secs(2));
        println!("Heartbeat...");
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use `cargo run --bin node` for host testing.");
}
