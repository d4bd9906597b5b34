use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

const SEED_DAYS: [&str; 3] = ["2025-11-09", "2025-11-10", "2025-11-11"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub date: String,
    pub time: String,
}

impl Slot {
    #[must_use]
    pub fn new(date: &str, time: &str) -> Self {
        Self {
            date: date.to_string(),
            time: time.to_string(),
        }
    }

    /// Spoken form, e.g. `2025-11-09 at 09:30`.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} at {}", self.date, self.time)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Doctor {
    pub doctor_id: String,
    pub name: String,
    pub specialty: String,
    pub available_slots: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Appointment {
    pub id: u64,
    pub doctor_id: String,
    pub doctor_name: String,
    pub date: String,
    pub time: String,
    pub patient_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Book {
    appointments: Vec<Appointment>,
    last_id: u64,
}

/// In-memory doctor roster and appointment book.
#[derive(Debug)]
pub struct Directory {
    doctors: Vec<Doctor>,
    book: Mutex<Book>,
}

/// Half-hour slots for every `step`-th hour from `start` to `end` inclusive.
fn slots_for_day(day: &str, start: u32, end: u32, step: usize) -> Vec<Slot> {
    (start..=end)
        .step_by(step)
        .flat_map(|hour| {
            [
                Slot::new(day, &format!("{hour:02}:00")),
                Slot::new(day, &format!("{hour:02}:30")),
            ]
        })
        .collect()
}

fn seed_doctor(id: &str, name: &str, specialty: &str, hours: (u32, u32), step: usize) -> Doctor {
    Doctor {
        doctor_id: id.to_string(),
        name: name.to_string(),
        specialty: specialty.to_string(),
        available_slots: SEED_DAYS
            .iter()
            .flat_map(|day| slots_for_day(day, hours.0, hours.1, step))
            .collect(),
    }
}

impl Directory {
    #[must_use]
    pub fn new(doctors: Vec<Doctor>) -> Self {
        Self {
            doctors,
            book: Mutex::new(Book::default()),
        }
    }

    /// The hospital roster the receptionist works with.
    #[must_use]
    pub fn seeded() -> Self {
        Self::new(vec![
            seed_doctor("dr_smith", "Dr. John Smith", "Cardiology", (9, 17), 1),
            seed_doctor("dr_lee", "Dr. Sarah Lee", "Dermatology", (10, 18), 2),
            seed_doctor("dr_johnson", "Dr. Michael Johnson", "Orthopedics", (8, 16), 1),
            seed_doctor("dr_khan", "Dr. Aisha Khan", "Pediatrics", (9, 15), 2),
            seed_doctor("dr_martinez", "Dr. Carlos Martinez", "Neurology", (11, 19), 1),
            seed_doctor("dr_oliver", "Dr. Emily Oliver", "Ophthalmology", (10, 14), 1),
            seed_doctor("dr_brown", "Dr. Marcus Brown", "General Surgery", (7, 12), 1),
            seed_doctor("dr_williams", "Dr. Priya Williams", "ENT", (12, 20), 1),
        ])
    }

    #[must_use]
    pub fn doctors(&self) -> &[Doctor] {
        &self.doctors
    }

    #[must_use]
    pub fn doctor_names(&self) -> Vec<String> {
        self.doctors.iter().map(|d| d.name.clone()).collect()
    }

    /// Case-insensitive substring match on the display name. A leading
    /// "Dr." in the query is ignored so "Dr. Smith" finds "Dr. John Smith".
    #[must_use]
    pub fn find(&self, query: &str) -> Option<&Doctor> {
        let lowered = query.trim().to_lowercase();
        let needle = lowered
            .strip_prefix("dr.")
            .or_else(|| lowered.strip_prefix("dr "))
            .unwrap_or(lowered.as_str())
            .trim();
        if needle.is_empty() {
            return None;
        }
        self.doctors
            .iter()
            .find(|d| d.name.to_lowercase().contains(needle))
    }

    /// Offered slots of `doctor` that nobody has booked.
    #[must_use]
    pub fn open_slots(&self, doctor: &Doctor) -> Vec<Slot> {
        let book = self.book.lock();
        doctor
            .available_slots
            .iter()
            .filter(|slot| !is_booked(&book, &doctor.doctor_id, &slot.date, &slot.time))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn is_slot_available(&self, doctor: &Doctor, date: &str, time: &str) -> bool {
        let book = self.book.lock();
        offers(doctor, date, time) && !is_booked(&book, &doctor.doctor_id, date, time)
    }

    /// Book a slot. Returns `None` if the slot is not offered or already taken.
    pub fn book(&self, doctor: &Doctor, date: &str, time: &str, patient_name: &str) -> Option<Appointment> {
        let mut book = self.book.lock();
        if !offers(doctor, date, time) || is_booked(&book, &doctor.doctor_id, date, time) {
            return None;
        }
        book.last_id += 1;
        let appointment = Appointment {
            id: book.last_id,
            doctor_id: doctor.doctor_id.clone(),
            doctor_name: doctor.name.clone(),
            date: date.to_string(),
            time: time.to_string(),
            patient_name: patient_name.to_string(),
            status: "confirmed".to_string(),
            created_at: Utc::now(),
        };
        book.appointments.push(appointment.clone());
        tracing::info!(doctor = %doctor.doctor_id, date, time, id = appointment.id, "Appointment booked");
        Some(appointment)
    }

    /// Cancel the matching appointment. The patient name is compared case-insensitively.
    pub fn cancel(&self, doctor: &Doctor, date: &str, time: &str, patient_name: &str) -> bool {
        let mut book = self.book.lock();
        let position = book.appointments.iter().position(|a| {
            a.doctor_id == doctor.doctor_id
                && a.date == date
                && a.time == time
                && a.patient_name.to_lowercase() == patient_name.to_lowercase()
        });
        let Some(index) = position else {
            return false;
        };
        let removed = book.appointments.remove(index);
        tracing::info!(doctor = %doctor.doctor_id, date, time, id = removed.id, "Appointment cancelled");
        true
    }

    #[must_use]
    pub fn appointments(&self) -> Vec<Appointment> {
        self.book.lock().appointments.clone()
    }
}

fn offers(doctor: &Doctor, date: &str, time: &str) -> bool {
    doctor
        .available_slots
        .iter()
        .any(|slot| slot.date == date && slot.time == time)
}

fn is_booked(book: &Book, doctor_id: &str, date: &str, time: &str) -> bool {
    book.appointments
        .iter()
        .any(|a| a.doctor_id == doctor_id && a.date == date && a.time == time)
}
