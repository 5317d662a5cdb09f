//! Calibration workflow
//!
//! A linear, operator-guided state machine that establishes the two
//! reference ADC readings (empty rack, empty jar) and then walks the
//! operator through placing one spice jar per slot. Bad console input is
//! re-prompted forever; store I/O failures abort the workflow with an error
//! and leave the controller running.

use crate::sensor::average_weight;
use crate::state::RackContext;
use crate::store::{
    empty_jar_key, slot_key, write_consolidated, SlotRecord, EMPTY_JAR_KEY_PREFIX, EMPTY_RACK_KEY,
};
use crate::{Error, Result};
use std::io::{BufRead, Write};
use std::time::Duration;
use tracing::{info, warn};

/// Delay between presence polls while waiting for the operator
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Interactive console seam, scriptable in tests
pub trait Operator: Send {
    /// Show `prompt` and read one line of input
    fn read_line(&mut self, prompt: &str) -> Result<String>;

    /// Show a message without expecting input
    fn say(&mut self, message: &str) -> Result<()>;
}

/// Stdin/stdout operator used by the daemon
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }

    fn say(&mut self, message: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", message)?;
        stdout.flush()?;
        Ok(())
    }
}

/// Run the full calibration workflow.
///
/// Holds the rack state lock for the duration; the coordinator is the only
/// other locker and is the caller, so no contention arises.
pub async fn run_calibration(ctx: &RackContext, operator: &mut dyn Operator) -> Result<()> {
    if ctx.reference_table.is_empty() {
        return Err(Error::Config(
            "reference table is empty; cannot calibrate volumes".to_string(),
        ));
    }

    let mut rack = ctx.rack.lock().await;
    info!("Calibration started");

    // AwaitEmptyRack
    operator.say("Calibration: remove all jars from the rack.")?;
    wait_for_presence(ctx, |status| status == 0).await?;

    // MeasureEmptyRack
    let empty_rack_adc = average_weight(ctx.weight.as_ref(), ctx.config.weight_samples)?;
    rack.references.empty_rack_adc = empty_rack_adc;
    info!("Empty rack baseline: {}", empty_rack_adc);
    let record = SlotRecord::new(EMPTY_RACK_KEY, "Empty Rack", empty_rack_adc, 0.0, 0.0);
    ctx.store.upsert(EMPTY_RACK_KEY, &record.to_line())?;

    // ConfirmJarMass
    let default_mass = rack.references.empty_jar_mass;
    if confirm(
        operator,
        &format!(
            "Override the default empty jar mass of {:.1}g? [y/n] ",
            default_mass
        ),
    )? {
        rack.references.empty_jar_mass = prompt_mass(operator)?;
    }
    let jar_mass = rack.references.empty_jar_mass;
    info!("Empty jar mass: {:.1}g", jar_mass);

    // AwaitEmptyJar
    operator.say("Place the empty jar in slot 1.")?;
    wait_for_presence(ctx, |status| status & 0x1 != 0).await?;

    // MeasureEmptyJar
    let empty_jar_adc = average_weight(ctx.weight.as_ref(), ctx.config.weight_samples)?;
    rack.references.empty_jar_adc = empty_jar_adc;
    info!("Empty jar baseline: {}", empty_jar_adc);
    let record = SlotRecord::new(empty_jar_key(jar_mass), "Empty Jar", empty_jar_adc, jar_mass, 0.0);
    // Match on the mass-independent prefix so a re-run with a different jar
    // mass replaces the old reference record
    ctx.store.upsert(EMPTY_JAR_KEY_PREFIX, &record.to_line())?;

    // AwaitJarRemoved
    operator.say("Remove the empty jar from slot 1.")?;
    wait_for_presence(ctx, |status| status & 0x1 == 0).await?;

    // PerSlotCalibration
    rack.current_adc_reading = rack.references.empty_rack_adc;
    let rack_size = ctx.config.rack_size;
    let mut previous_status: u8 = 0;
    let mut calibrated = vec![false; rack_size];

    operator.say(&format!(
        "Place one filled jar at a time ({} slots to calibrate).",
        rack_size
    ))?;

    while calibrated.iter().any(|done| !done) {
        let status = match ctx.debouncer.read_stable(ctx.presence.as_ref()).await? {
            Some(status) => status,
            None => continue,
        };
        let delta = i32::from(status) - i32::from(previous_status);
        if delta <= 0 || !(delta as u32).is_power_of_two() {
            // Removal, no change, or a multi-bit transient: re-poll
            if delta != 0 {
                warn!(
                    "Ignoring presence transition {:#05b} -> {:#05b} during calibration",
                    previous_status, status
                );
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
            continue;
        }

        let slot = delta.trailing_zeros() as usize + 1;
        if slot > rack_size {
            warn!("Presence bit {} exceeds rack size {}", slot, rack_size);
            previous_status = status;
            continue;
        }

        let averaged = average_weight(ctx.weight.as_ref(), ctx.config.weight_samples)?;
        rack.shift_baseline(averaged);
        let grams = rack
            .references
            .adc_to_grams(rack.previous_adc_reading, rack.current_adc_reading)?;

        let (name, volume_tsp) = prompt_spice_name(ctx, operator, slot, grams)?;
        let key = slot_key(slot);
        let record = SlotRecord::new(key.clone(), &name, averaged, grams, volume_tsp);
        ctx.store.upsert(&key, &record.to_line())?;
        rack.slots[slot - 1] = Some(record);
        info!(
            "Calibrated slot {}: {} ({:.1}g, {:.2}tsp)",
            slot, name, grams, volume_tsp
        );

        previous_status = status;
        calibrated[slot - 1] = true;
    }

    // Done: refresh the mirror from disk and publish the projection
    let records = ctx.store.load_records()?;
    rack.rebuild(records);
    write_consolidated(&ctx.config.consolidated_path, &rack.slots)?;

    // Presence changed throughout the workflow; rebaseline the monitor so
    // jars placed during calibration do not replay as add events
    ctx.seed_presence(previous_status);

    info!("Calibration complete");
    operator.say("Calibration complete.")?;
    Ok(())
}

/// Poll the debounced presence sensor until `accept` passes
async fn wait_for_presence(ctx: &RackContext, accept: impl Fn(u8) -> bool) -> Result<()> {
    loop {
        if let Some(status) = ctx.debouncer.read_stable(ctx.presence.as_ref()).await? {
            if accept(status) {
                return Ok(());
            }
        }
        tokio::time::sleep(WAIT_POLL_INTERVAL).await;
    }
}

/// y/n prompt, re-asked until the answer is recognizable
fn confirm(operator: &mut dyn Operator, prompt: &str) -> Result<bool> {
    loop {
        let answer = operator.read_line(prompt)?;
        match answer.trim() {
            "y" | "Y" => return Ok(true),
            "n" | "N" => return Ok(false),
            other => {
                operator.say(&format!("Please answer y or n (got {:?}).", other))?;
            }
        }
    }
}

/// Prompt for a jar mass until a positive finite value parses
fn prompt_mass(operator: &mut dyn Operator) -> Result<f64> {
    loop {
        let answer = operator.read_line("Empty jar mass in grams: ")?;
        match answer.trim().parse::<f64>() {
            Ok(mass) if mass.is_finite() && mass > 0.0 => return Ok(mass),
            _ => operator.say("Enter a positive number, e.g. 130.0")?,
        }
    }
}

/// Prompt for a spice name until it resolves in the reference table,
/// returning the sanitized name and its volume in teaspoons
fn prompt_spice_name(
    ctx: &RackContext,
    operator: &mut dyn Operator,
    slot: usize,
    grams: f64,
) -> Result<(String, f64)> {
    loop {
        let raw = operator.read_line(&format!("Name of the spice in slot {}: ", slot))?;
        let name = crate::store::record::sanitize_name(&raw);
        if name.is_empty() {
            operator.say("Name cannot be empty.")?;
            continue;
        }
        match ctx.reference_table.grams_to_tsp(&name, grams) {
            Some(volume) => return Ok((name, volume)),
            None => {
                operator.say(&format!(
                    "Unknown spice {:?}. Known spices: {}",
                    name,
                    ctx.reference_table.names().join(", ")
                ))?;
            }
        }
    }
}
