use crate::live::{ToolOutcome, ToolRegistry, ToolStatus};
use crate::Result;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::directory::{Directory, Slot};

const MAX_ALTERNATIVES: usize = 3;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoArgs {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SlotsArgs {
    /// The name of the doctor to check availability for.
    pub doctor_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BookArgs {
    /// The name of the doctor.
    pub doctor_name: String,
    /// The appointment date in YYYY-MM-DD format.
    pub date: String,
    /// The appointment time in HH:MM format (24-hour).
    pub time: String,
    /// The name of the patient booking the appointment.
    #[serde(default = "default_patient")]
    pub patient_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CancelArgs {
    /// The doctor's name for the appointment.
    pub doctor_name: String,
    /// The appointment date in YYYY-MM-DD format.
    pub date: String,
    /// The appointment time in HH:MM format (24-hour).
    pub time: String,
    /// The patient name on the appointment.
    #[serde(default = "default_patient")]
    pub patient_name: String,
}

fn default_patient() -> String {
    "Patient".to_string()
}

fn spoken_list(slots: &[Slot]) -> String {
    slots.iter().map(Slot::describe).collect::<Vec<_>>().join(", ")
}

pub fn list_doctors(directory: &Directory) -> ToolOutcome {
    let names = directory.doctor_names();
    ToolOutcome::success(format!("Available doctors: {}", names.join(", ")))
        .with("doctors", json!(names))
}

/// # Errors
/// Returns an error if the slot list cannot be serialized.
#[allow(clippy::result_large_err)]
pub fn get_available_slots(directory: &Directory, args: &SlotsArgs) -> Result<ToolOutcome> {
    let Some(doctor) = directory.find(&args.doctor_name) else {
        return Ok(ToolOutcome::error(format!(
            "I couldn't find a doctor named {}. Available doctors are: {}",
            args.doctor_name,
            directory.doctor_names().join(", ")
        )));
    };

    let open = directory.open_slots(doctor);
    if open.is_empty() {
        return Ok(ToolOutcome::success(format!(
            "{} has no available slots at the moment.",
            doctor.name
        ))
        .with("slots", json!([])));
    }

    Ok(ToolOutcome::success(format!(
        "{} ({}) is available on: {}",
        doctor.name,
        doctor.specialty,
        spoken_list(&open)
    ))
    .with("doctor", json!(doctor.name))
    .with("specialty", json!(doctor.specialty))
    .with("slots", serde_json::to_value(&open)?))
}

/// # Errors
/// Returns an error if the appointment cannot be serialized.
#[allow(clippy::result_large_err)]
pub fn book_appointment(directory: &Directory, args: &BookArgs) -> Result<ToolOutcome> {
    let Some(doctor) = directory.find(&args.doctor_name) else {
        return Ok(ToolOutcome::error(format!(
            "I couldn't find a doctor named {}. Available doctors are: {}",
            args.doctor_name,
            directory.doctor_names().join(", ")
        )));
    };

    let Some(appointment) = directory.book(doctor, &args.date, &args.time, &args.patient_name) else {
        let open = directory.open_slots(doctor);
        if open.is_empty() {
            return Ok(ToolOutcome::error(format!(
                "Sorry, {} has no available slots at the moment.",
                doctor.name
            )));
        }
        let alternatives = &open[..open.len().min(MAX_ALTERNATIVES)];
        return Ok(ToolOutcome::new(
            ToolStatus::SlotUnavailable,
            format!(
                "Sorry, {} is not available on {} at {}. How about: {}?",
                doctor.name,
                args.date,
                args.time,
                spoken_list(alternatives)
            ),
        )
        .with("alternatives", serde_json::to_value(alternatives)?));
    };

    Ok(ToolOutcome::success(format!(
        "Perfect! I've booked your appointment with {} on {} at {}. Your appointment is confirmed.",
        doctor.name, args.date, args.time
    ))
    .with("appointment", serde_json::to_value(&appointment)?))
}

pub fn cancel_appointment(directory: &Directory, args: &CancelArgs) -> ToolOutcome {
    let Some(doctor) = directory.find(&args.doctor_name) else {
        return ToolOutcome::error(format!(
            "I couldn't find a doctor named {}.",
            args.doctor_name
        ));
    };

    if directory.cancel(doctor, &args.date, &args.time, &args.patient_name) {
        ToolOutcome::success(format!(
            "Your appointment with {} on {} at {} has been cancelled successfully.",
            doctor.name, args.date, args.time
        ))
    } else {
        ToolOutcome::new(
            ToolStatus::NotFound,
            format!(
                "I couldn't find an appointment with {} on {} at {}. Please check the details.",
                doctor.name, args.date, args.time
            ),
        )
    }
}

/// Register the receptionist tools against `directory`.
pub fn register_tools(registry: &mut ToolRegistry, directory: &Arc<Directory>) {
    let dir = Arc::clone(directory);
    registry.tool(
        "list_doctors",
        "Get a list of all available doctors in the hospital.",
        move |_: NoArgs| {
            let outcome = list_doctors(&dir);
            async move { Ok(outcome) }
        },
    );

    let dir = Arc::clone(directory);
    registry.tool(
        "get_available_slots",
        "Get available appointment slots for a specific doctor.",
        move |args: SlotsArgs| {
            let outcome = get_available_slots(&dir, &args);
            async move { outcome }
        },
    );

    let dir = Arc::clone(directory);
    registry.tool(
        "book_appointment",
        "Book an appointment with a doctor at a specific date and time.",
        move |args: BookArgs| {
            let outcome = book_appointment(&dir, &args);
            async move { outcome }
        },
    );

    let dir = Arc::clone(directory);
    registry.tool(
        "cancel_appointment",
        "Cancel an existing appointment.",
        move |args: CancelArgs| {
            let outcome = cancel_appointment(&dir, &args);
            async move { Ok(outcome) }
        },
    );

    registry.tool(
        "end_call",
        "Politely close the current call once the user has finished.",
        |_: NoArgs| async { Ok(ToolOutcome::success("Call ended")) },
    );
}
