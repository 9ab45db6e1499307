//! Fleet records and the table definitions of the dashboard pages.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arboard::Clipboard;
use chrono::{Duration, NaiveDate, NaiveTime};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::display::{Content, DisplayCell, DisplayMap, Tone};
use crate::domain::TableError;
use crate::export::{self, ExportDocument, ExportFormat};
use crate::filter::{FilterConfig, FilterConfigMap, FilterValue};
use crate::record::{FieldValue, Record};
use crate::selection::{ActionVariant, BulkOutcome, MultiSelectOption};
use crate::table::RowForm;

// ------------------------------------------------------------------------ //
// Records
// ------------------------------------------------------------------------ //

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    pub plate: String,
    pub model: String,
    pub kind: String,
    pub status: String,
    pub driver: String,
    pub speed: f64,
    pub fuel_level: f64,
    pub odometer_km: f64,
    pub ignition: bool,
    pub gps_active: bool,
    pub location: String,
    pub last_update: String,
    pub insurance_expiry: String,
}

impl Record for Vehicle {
    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => self.id.as_str().into(),
            "plate" => self.plate.as_str().into(),
            "model" => self.model.as_str().into(),
            "kind" => self.kind.as_str().into(),
            "status" => self.status.as_str().into(),
            "driver" => self.driver.as_str().into(),
            "speed" => self.speed.into(),
            "fuelLevel" => self.fuel_level.into(),
            "odometerKm" => self.odometer_km.into(),
            "ignition" => self.ignition.into(),
            "gpsActive" => self.gps_active.into(),
            "location" => self.location.as_str().into(),
            "lastUpdate" => self.last_update.as_str().into(),
            "insuranceExpiry" => self.insurance_expiry.as_str().into(),
            _ => FieldValue::Null,
        }
    }

    fn values(&self) -> Vec<FieldValue> {
        [
            "id",
            "plate",
            "model",
            "kind",
            "status",
            "driver",
            "speed",
            "fuelLevel",
            "odometerKm",
            "ignition",
            "gpsActive",
            "location",
            "lastUpdate",
            "insuranceExpiry",
        ]
        .iter()
        .map(|f| self.field(f))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Administrator {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub region: String,
    pub active: bool,
    pub two_factor: bool,
    pub vehicles_managed: u32,
    pub last_login: String,
}

impl Record for Administrator {
    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => self.id.as_str().into(),
            "name" => self.name.as_str().into(),
            "email" => self.email.as_str().into(),
            "role" => self.role.as_str().into(),
            "region" => self.region.as_str().into(),
            "active" => self.active.into(),
            "twoFactor" => self.two_factor.into(),
            "vehiclesManaged" => self.vehicles_managed.into(),
            "lastLogin" => self.last_login.as_str().into(),
            _ => FieldValue::Null,
        }
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.id.as_str().into(),
            self.name.as_str().into(),
            self.email.as_str().into(),
            self.role.as_str().into(),
            self.region.as_str().into(),
            self.active.into(),
            self.two_factor.into(),
            self.vehicles_managed.into(),
            self.last_login.as_str().into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub doc_type: String,
    pub vehicle_plate: String,
    pub file_name: String,
    pub size_kb: f64,
    pub uploaded_on: String,
    pub expires_on: Option<String>,
    pub verified: bool,
}

impl Record for Document {
    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => self.id.as_str().into(),
            "name" => self.name.as_str().into(),
            "docType" => self.doc_type.as_str().into(),
            "vehiclePlate" => self.vehicle_plate.as_str().into(),
            "fileName" => self.file_name.as_str().into(),
            "sizeKb" => self.size_kb.into(),
            "uploadedOn" => self.uploaded_on.as_str().into(),
            "expiresOn" => self.expires_on.clone().into(),
            "verified" => self.verified.into(),
            _ => FieldValue::Null,
        }
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.id.as_str().into(),
            self.name.as_str().into(),
            self.doc_type.as_str().into(),
            self.vehicle_plate.as_str().into(),
            self.file_name.as_str().into(),
            self.size_kb.into(),
            self.uploaded_on.as_str().into(),
            self.expires_on.clone().into(),
            self.verified.into(),
        ]
    }
}

// ------------------------------------------------------------------------ //
// Mock data
// ------------------------------------------------------------------------ //

pub const VEHICLE_KINDS: &[&str] = &["Truck", "Van", "Car", "Bus", "Tanker"];
pub const VEHICLE_STATUSES: &[&str] = &["Moving", "Idle", "Parked", "Maintenance", "Offline"];
pub const ADMIN_ROLES: &[&str] = &["Super Admin", "Fleet Manager", "Dispatcher", "Viewer"];
pub const REGIONS: &[&str] = &["North", "South", "East", "West", "Central"];
pub const DOCUMENT_TYPES: &[&str] = &["Insurance", "Registration", "Permit", "Pollution", "Fitness"];

const MODELS: &[&str] = &[
    "Tata Prima 4028",
    "Ashok Leyland Dost",
    "Mahindra Bolero Pik-Up",
    "Eicher Pro 2049",
    "Volvo FM 420",
    "Force Traveller",
    "Toyota Innova",
];
const FIRST_NAMES: &[&str] = &[
    "Asha", "Ravi", "Meera", "Arjun", "Kiran", "Nisha", "Vikram", "Priya", "Sanjay", "Farah",
];
const LAST_NAMES: &[&str] = &[
    "Rao", "Sharma", "Iyer", "Khan", "Patel", "Nair", "Singh", "Das", "Mehta", "Joshi",
];
const CITIES: &[&str] = &[
    "Pune", "Mumbai", "Bengaluru", "Chennai", "Delhi", "Hyderabad", "Nagpur", "Indore",
];
const STATE_CODES: &[&str] = &["MH", "KA", "TN", "DL", "TS", "GJ", "MP"];

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn person(rng: &mut StdRng) -> String {
    format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
}

/// `YYYY-MM-DD hh:mm AM/PM`, the format the tracking units report.
fn timestamp(date: NaiveDate, rng: &mut StdRng) -> String {
    let time = NaiveTime::from_hms_opt(rng.random_range(0..24), rng.random_range(0..60), 0)
        .unwrap_or_default();
    date.and_time(time).format("%Y-%m-%d %I:%M %p").to_string()
}

pub fn seed_vehicles(count: usize, rng: &mut StdRng, today: NaiveDate) -> Vec<Vehicle> {
    (0..count)
        .map(|i| {
            let status = pick(rng, VEHICLE_STATUSES);
            let moving = status == "Moving";
            let speed = if moving {
                rng.random_range(20..95) as f64
            } else {
                0.0
            };
            let seen = today - Duration::days(rng.random_range(0..4));
            let expiry = today + Duration::days(rng.random_range(-60..400));
            Vehicle {
                id: format!("VH-{:04}", i + 1),
                plate: format!(
                    "{}{:02} {}{} {:04}",
                    pick(rng, STATE_CODES),
                    rng.random_range(1..50),
                    rng.random_range(b'A'..=b'Z') as char,
                    rng.random_range(b'A'..=b'Z') as char,
                    rng.random_range(1000..10000)
                ),
                model: pick(rng, MODELS).to_string(),
                kind: pick(rng, VEHICLE_KINDS).to_string(),
                status: status.to_string(),
                driver: person(rng),
                speed,
                fuel_level: rng.random_range(3..100) as f64,
                odometer_km: rng.random_range(1_000..400_000) as f64,
                ignition: moving || (status == "Idle"),
                gps_active: status != "Offline",
                location: pick(rng, CITIES).to_string(),
                last_update: timestamp(seen, rng),
                insurance_expiry: expiry.format("%Y-%m-%d").to_string(),
            }
        })
        .collect()
}

pub fn seed_administrators(count: usize, rng: &mut StdRng, today: NaiveDate) -> Vec<Administrator> {
    (0..count)
        .map(|i| {
            let name = person(rng);
            let email = format!(
                "{}.{}@fleet.example",
                name.split_whitespace().next().unwrap_or("admin").to_lowercase(),
                i + 1
            );
            let login = today - Duration::days(rng.random_range(0..90));
            Administrator {
                id: format!("AD-{:03}", i + 1),
                name,
                email,
                role: pick(rng, ADMIN_ROLES).to_string(),
                region: pick(rng, REGIONS).to_string(),
                active: rng.random_bool(0.8),
                two_factor: rng.random_bool(0.6),
                vehicles_managed: rng.random_range(0..120),
                last_login: timestamp(login, rng),
            }
        })
        .collect()
}

pub fn seed_documents(vehicles: &[Vehicle], rng: &mut StdRng, today: NaiveDate) -> Vec<Document> {
    let mut docs = Vec::new();
    for vehicle in vehicles {
        let kinds: Vec<&str> = DOCUMENT_TYPES
            .iter()
            .copied()
            .filter(|_| rng.random_bool(0.5))
            .collect();
        for doc_type in kinds {
            let uploaded = today - Duration::days(rng.random_range(1..700));
            let expires = (doc_type != "Registration")
                .then(|| (today + Duration::days(rng.random_range(-45..365))).format("%Y-%m-%d").to_string());
            docs.push(Document {
                id: format!("DOC-{:05}", docs.len() + 1),
                name: format!("{doc_type} - {}", vehicle.plate),
                doc_type: doc_type.to_string(),
                vehicle_plate: vehicle.plate.clone(),
                file_name: format!(
                    "{}_{}.pdf",
                    doc_type.to_lowercase(),
                    vehicle.plate.replace(' ', "")
                ),
                size_kb: rng.random_range(40..4_000) as f64,
                uploaded_on: uploaded.format("%Y-%m-%d").to_string(),
                expires_on: expires,
                verified: rng.random_bool(0.7),
            });
        }
    }
    docs
}

// ------------------------------------------------------------------------ //
// Add / edit forms
// ------------------------------------------------------------------------ //

/// Input of the "add vehicle" and "edit vehicle" forms.
#[derive(Debug, Clone, Default)]
pub struct VehicleDraft {
    pub plate: String,
    pub model: String,
    pub kind: String,
    pub driver: String,
}

impl VehicleDraft {
    pub fn from_vehicle(vehicle: &Vehicle) -> Self {
        Self {
            plate: vehicle.plate.clone(),
            model: vehicle.model.clone(),
            kind: vehicle.kind.clone(),
            driver: vehicle.driver.clone(),
        }
    }

    fn validate(&self) -> Result<(), TableError> {
        let plate = self.plate.trim();
        if plate.is_empty() {
            return Err(TableError::Validation("Please enter a registration plate".into()));
        }
        if !plate.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-') {
            return Err(TableError::Validation(format!("Invalid registration plate: {plate}")));
        }
        if self.model.trim().is_empty() {
            return Err(TableError::Validation("Please enter a vehicle model".into()));
        }
        if !self.kind.is_empty() && !VEHICLE_KINDS.contains(&self.kind.as_str()) {
            return Err(TableError::Validation(format!("Unknown vehicle type: {}", self.kind)));
        }
        Ok(())
    }

    /// New vehicle, parked with ignition off until the first report.
    pub fn create(self, id: String, today: NaiveDate) -> Result<Vehicle, TableError> {
        self.validate()?;
        Ok(Vehicle {
            id,
            plate: self.plate.trim().to_uppercase(),
            model: self.model.trim().to_string(),
            kind: if self.kind.is_empty() { "Car".to_string() } else { self.kind },
            status: "Parked".to_string(),
            driver: self.driver.trim().to_string(),
            speed: 0.0,
            fuel_level: 100.0,
            odometer_km: 0.0,
            ignition: false,
            gps_active: false,
            location: String::new(),
            last_update: String::new(),
            insurance_expiry: (today + Duration::days(365)).format("%Y-%m-%d").to_string(),
        })
    }

    /// Copy of `vehicle` with the edited fields applied.
    pub fn apply(self, vehicle: &Vehicle) -> Result<Vehicle, TableError> {
        self.validate()?;
        Ok(Vehicle {
            plate: self.plate.trim().to_uppercase(),
            model: self.model.trim().to_string(),
            kind: if self.kind.is_empty() { vehicle.kind.clone() } else { self.kind },
            driver: self.driver.trim().to_string(),
            ..vehicle.clone()
        })
    }
}

/// Input of the "upload document" form.
#[derive(Debug, Clone, Default)]
pub struct DocumentDraft {
    pub name: String,
    pub doc_type: String,
    pub vehicle_plate: String,
    pub file: Option<PathBuf>,
    pub expires_on: Option<NaiveDate>,
}

impl DocumentDraft {
    pub fn create(self, id: String, today: NaiveDate) -> Result<Document, TableError> {
        if self.name.trim().is_empty() {
            return Err(TableError::Validation("Please enter a document name".into()));
        }
        let Some(file) = self.file else {
            return Err(TableError::Validation("Please choose a file to upload".into()));
        };
        let metadata = fs::metadata(&file)
            .map_err(|_| TableError::Validation(format!("Cannot read {}", file.display())))?;
        if !metadata.is_file() {
            return Err(TableError::Validation(format!("{} is not a file", file.display())));
        }
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Document {
            id,
            name: self.name.trim().to_string(),
            doc_type: if self.doc_type.is_empty() {
                "Other".to_string()
            } else {
                self.doc_type
            },
            vehicle_plate: self.vehicle_plate.trim().to_uppercase(),
            file_name,
            size_kb: (metadata.len() as f64 / 1024.0).ceil(),
            uploaded_on: today.format("%Y-%m-%d").to_string(),
            expires_on: self.expires_on.map(|d| d.format("%Y-%m-%d").to_string()),
            verified: false,
        })
    }
}

fn field(values: &[String], idx: usize) -> String {
    values.get(idx).cloned().unwrap_or_default()
}

/// Next free `<prefix>NNN` id above the highest one in use.
fn next_id<'a>(prefix: &str, width: usize, ids: impl Iterator<Item = &'a str>) -> String {
    let max = ids
        .filter_map(|id| id.strip_prefix(prefix))
        .filter_map(|n| n.parse::<usize>().ok())
        .max()
        .unwrap_or(0);
    format!("{prefix}{:0width$}", max + 1)
}

pub struct VehicleForm {
    pub today: NaiveDate,
}

impl RowForm<Vehicle> for VehicleForm {
    fn fields(&self) -> &[&'static str] {
        &["Plate", "Model", "Type", "Driver"]
    }

    fn values_of(&self, row: &Vehicle) -> Vec<String> {
        vec![row.plate.clone(), row.model.clone(), row.kind.clone(), row.driver.clone()]
    }

    fn create(&self, values: &[String], rows: &[Vehicle]) -> Result<Vehicle, TableError> {
        let id = next_id("VH-", 4, rows.iter().map(|v| v.id.as_str()));
        VehicleDraft::from_values(values).create(id, self.today)
    }

    fn update(&self, row: &Vehicle, values: &[String]) -> Result<Vehicle, TableError> {
        VehicleDraft::from_values(values).apply(row)
    }
}

impl VehicleDraft {
    fn from_values(values: &[String]) -> Self {
        Self {
            plate: field(values, 0),
            model: field(values, 1),
            kind: field(values, 2).trim().to_string(),
            driver: field(values, 3),
        }
    }
}

pub struct DocumentForm {
    pub today: NaiveDate,
}

impl DocumentForm {
    fn draft(values: &[String]) -> Result<DocumentDraft, TableError> {
        let expires = field(values, 4);
        let expires_on = match expires.trim() {
            "" => None,
            date => Some(NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                TableError::Validation(format!("Expiry date must be YYYY-MM-DD, got {date}"))
            })?),
        };
        let file = field(values, 3);
        let file = file.trim();
        Ok(DocumentDraft {
            name: field(values, 0),
            doc_type: field(values, 1).trim().to_string(),
            vehicle_plate: field(values, 2),
            file: (!file.is_empty()).then(|| PathBuf::from(shellexpand::tilde(file).as_ref())),
            expires_on,
        })
    }
}

impl RowForm<Document> for DocumentForm {
    fn fields(&self) -> &[&'static str] {
        &["Name", "Type", "Vehicle plate", "File", "Expires (YYYY-MM-DD)"]
    }

    fn values_of(&self, row: &Document) -> Vec<String> {
        vec![
            row.name.clone(),
            row.doc_type.clone(),
            row.vehicle_plate.clone(),
            String::new(),
            row.expires_on.clone().unwrap_or_default(),
        ]
    }

    fn create(&self, values: &[String], rows: &[Document]) -> Result<Document, TableError> {
        let id = next_id("DOC-", 5, rows.iter().map(|d| d.id.as_str()));
        Self::draft(values)?.create(id, self.today)
    }

    /// Without a new file the stored file is kept.
    fn update(&self, row: &Document, values: &[String]) -> Result<Document, TableError> {
        let draft = Self::draft(values)?;
        if draft.file.is_some() {
            let replaced = draft.create(row.id.clone(), self.today)?;
            return Ok(Document {
                verified: false,
                ..replaced
            });
        }
        if draft.name.trim().is_empty() {
            return Err(TableError::Validation("Please enter a document name".into()));
        }
        Ok(Document {
            name: draft.name.trim().to_string(),
            doc_type: if draft.doc_type.is_empty() {
                row.doc_type.clone()
            } else {
                draft.doc_type
            },
            vehicle_plate: draft.vehicle_plate.trim().to_uppercase(),
            expires_on: draft.expires_on.map(|d| d.format("%Y-%m-%d").to_string()),
            ..row.clone()
        })
    }
}

// ------------------------------------------------------------------------ //
// Table definitions
// ------------------------------------------------------------------------ //

fn status_tone(status: &str) -> Tone {
    match status {
        "Moving" => Tone::Success,
        "Idle" => Tone::Warning,
        "Maintenance" => Tone::Danger,
        "Offline" => Tone::Muted,
        _ => Tone::Info,
    }
}

fn flag(on: bool, yes: &str, no: &str) -> Content {
    if on {
        Content::styled(Tone::Success, Content::text(yes))
    } else {
        Content::styled(Tone::Muted, Content::text(no))
    }
}

fn days_until(date: &str, today: NaiveDate) -> Option<i64> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|d| (d - today).num_days())
}

fn expiry_cell(date: Option<&str>, today: NaiveDate) -> Content {
    let Some(date) = date else {
        return Content::styled(Tone::Muted, Content::text("—"));
    };
    let tone = match days_until(date, today) {
        Some(d) if d < 0 => Tone::Danger,
        Some(d) if d <= 30 => Tone::Warning,
        _ => Tone::Plain,
    };
    Content::styled(tone, Content::text(date))
}

fn expiry_tooltip(date: Option<&str>, today: NaiveDate) -> Content {
    match date.and_then(|d| days_until(d, today)) {
        Some(d) if d < 0 => Content::text(format!("Expired {} days ago", -d)),
        Some(0) => Content::text("Expires today"),
        Some(d) => Content::text(format!("Expires in {d} days")),
        None => Content::text("No expiry date"),
    }
}

pub fn vehicle_columns(today: NaiveDate) -> DisplayMap<Vehicle> {
    DisplayMap::from([
        (
            0,
            DisplayCell::new("Vehicle", |v: &Vehicle| {
                Content::Group(vec![
                    Content::styled(Tone::Strong, Content::text(v.plate.clone())),
                    Content::text(" "),
                    Content::styled(Tone::Muted, Content::text(v.model.clone())),
                ])
            })
            .with_tooltip(|v: &Vehicle| Content::text(format!("{} · {}", v.id, v.kind))),
        ),
        (1, DisplayCell::new("Driver", |v: &Vehicle| Content::text(v.driver.clone()))),
        (
            2,
            DisplayCell::new("Status", |v: &Vehicle| {
                Content::styled(status_tone(&v.status), Content::text(v.status.clone()))
            }),
        ),
        (
            3,
            DisplayCell::new("Speed", |v: &Vehicle| Content::text(format!("{} km/h", v.speed)))
                .with_compare(|a: &Vehicle, b: &Vehicle| a.speed.total_cmp(&b.speed)),
        ),
        (
            4,
            DisplayCell::new("Fuel", |v: &Vehicle| {
                let tone = if v.fuel_level < 15.0 { Tone::Danger } else { Tone::Plain };
                Content::styled(tone, Content::text(format!("{}%", v.fuel_level)))
            })
            .with_compare(|a: &Vehicle, b: &Vehicle| a.fuel_level.total_cmp(&b.fuel_level)),
        ),
        (
            5,
            DisplayCell::new("Odometer", |v: &Vehicle| {
                Content::text(format!("{} km", v.odometer_km))
            })
            .with_compare(|a: &Vehicle, b: &Vehicle| a.odometer_km.total_cmp(&b.odometer_km)),
        ),
        (6, DisplayCell::new("Ignition", |v: &Vehicle| flag(v.ignition, "On", "Off"))),
        (
            7,
            DisplayCell::new("Location", |v: &Vehicle| Content::text(v.location.clone()))
                .with_tooltip(|v: &Vehicle| {
                    Content::text(if v.gps_active { "GPS signal live" } else { "GPS signal lost" })
                }),
        ),
        (8, DisplayCell::new("Last update", |v: &Vehicle| Content::text(v.last_update.clone()))),
        (
            9,
            DisplayCell::new("Insurance", move |v: &Vehicle| {
                expiry_cell(Some(&v.insurance_expiry), today)
            })
            .with_tooltip(move |v: &Vehicle| expiry_tooltip(Some(&v.insurance_expiry), today)),
        ),
    ])
}

/// Custom filter: low fuel, in the workshop, or insurance lapsed.
fn needs_attention(v: &Vehicle, today: NaiveDate) -> bool {
    v.fuel_level < 15.0
        || v.status == "Maintenance"
        || days_until(&v.insurance_expiry, today).is_some_and(|d| d < 0)
}

fn wants_yes(value: &FilterValue) -> bool {
    match value {
        FilterValue::Bool(b) => *b,
        FilterValue::Text(s) => matches!(s.to_lowercase().as_str(), "yes" | "y" | "true" | "1"),
        FilterValue::Custom(serde_json::Value::Bool(b)) => *b,
        FilterValue::Custom(serde_json::Value::String(s)) => {
            matches!(s.to_lowercase().as_str(), "yes" | "y" | "true" | "1")
        }
        _ => false,
    }
}

pub fn vehicle_filters(today: NaiveDate) -> FilterConfigMap<Vehicle> {
    FilterConfigMap::new()
        .with("plate", FilterConfig::text("Plate", "plate"))
        .with("driver", FilterConfig::text("Driver", "driver"))
        .with("status", FilterConfig::select("Status", "status", VEHICLE_STATUSES.iter().copied(), true))
        .with("kind", FilterConfig::select("Type", "kind", VEHICLE_KINDS.iter().copied(), false))
        .with("ignition", FilterConfig::boolean("Ignition", "ignition"))
        .with("speed", FilterConfig::number_range("Speed (km/h)", "speed"))
        .with("fuelLevel", FilterConfig::number_range("Fuel (%)", "fuelLevel"))
        .with("lastUpdate", FilterConfig::date_range("Last update", "lastUpdate"))
        .with(
            "attention",
            FilterConfig::custom("Needs attention", move |v: &Vehicle, value: &FilterValue| {
                !wants_yes(value) || needs_attention(v, today)
            })
            .with_editor(|value| {
                Content::text(if wants_yes(value) { "only flagged vehicles" } else { "any" })
            }),
        )
}

/// Minimal projection used by the vehicle page's JSON export.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSummary<'a> {
    pub id: &'a str,
    pub plate: &'a str,
    pub driver: &'a str,
    pub status: &'a str,
    pub speed: f64,
    pub last_update: &'a str,
}

impl<'a> From<&'a Vehicle> for VehicleSummary<'a> {
    fn from(v: &'a Vehicle) -> Self {
        Self {
            id: &v.id,
            plate: &v.plate,
            driver: &v.driver,
            status: &v.status,
            speed: v.speed,
            last_update: &v.last_update,
        }
    }
}

pub fn vehicle_summary_json(rows: &[&Vehicle]) -> Result<String, TableError> {
    let summary: Vec<VehicleSummary> = rows.iter().map(|v| VehicleSummary::from(*v)).collect();
    export::to_json(&summary)
}

fn copy_to_clipboard(text: String) -> Result<(), TableError> {
    let mut clipboard = Clipboard::new().map_err(|e| TableError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text)
        .map_err(|e| TableError::Clipboard(e.to_string()))
}

/// Writes `body` as a JSON export named after `title` into `dir`.
fn write_json(title: &str, body: String, dir: &Path) -> Result<PathBuf, TableError> {
    let doc = ExportDocument::new(title, ExportFormat::Json, body, chrono::Local::now().naive_local());
    doc.write_to(dir)
}

pub fn vehicle_actions(export_dir: PathBuf) -> Vec<MultiSelectOption<Vehicle>> {
    let export_dir = Arc::new(export_dir);
    vec![
        MultiSelectOption::new("Copy plates", |rows: &[&Vehicle], _ids: &HashSet<String>| {
            let text = rows
                .iter()
                .map(|v| format!("{}\t{}\t{}", v.plate, v.driver, v.status))
                .collect::<Vec<_>>()
                .join("\n");
            copy_to_clipboard(text)?;
            Ok(BulkOutcome::Message(format!("Copied {} vehicles", rows.len())))
        })
        .icon("⎘")
        .tooltip("Copy plate, driver and status to the clipboard"),
        MultiSelectOption::new("Export selected (JSON)", move |rows: &[&Vehicle], _ids: &HashSet<String>| {
            let path = write_json("Selected vehicles", vehicle_summary_json(rows)?, &export_dir)?;
            Ok(BulkOutcome::Message(format!("Saved {}", path.display())))
        })
        .variant(ActionVariant::Secondary)
        .icon("⇩"),
        MultiSelectOption::new("Remove from fleet", |rows: &[&Vehicle], _ids: &HashSet<String>| {
            info!("Removing {} vehicles from the fleet", rows.len());
            Ok(BulkOutcome::Remove)
        })
        .variant(ActionVariant::Destructive)
        .icon("✕")
        .tooltip("Removes the selected vehicles from this dashboard"),
    ]
}

pub fn administrator_columns() -> DisplayMap<Administrator> {
    DisplayMap::from([
        (
            0,
            DisplayCell::new("Name", |a: &Administrator| Content::text(a.name.clone()))
                .with_tooltip(|a: &Administrator| Content::text(format!("{} · {}", a.id, a.email))),
        ),
        (1, DisplayCell::new("Email", |a: &Administrator| Content::text(a.email.clone()))),
        (
            2,
            DisplayCell::new("Role", |a: &Administrator| {
                let tone = if a.role == "Super Admin" { Tone::Strong } else { Tone::Plain };
                Content::styled(tone, Content::text(a.role.clone()))
            }),
        ),
        (3, DisplayCell::new("Region", |a: &Administrator| Content::text(a.region.clone()))),
        (4, DisplayCell::new("Status", |a: &Administrator| flag(a.active, "Active", "Inactive"))),
        (5, DisplayCell::new("2FA", |a: &Administrator| flag(a.two_factor, "Enabled", "Off"))),
        (
            6,
            DisplayCell::new("Vehicles", |a: &Administrator| Content::Number(a.vehicles_managed as f64))
                .with_compare(|a: &Administrator, b: &Administrator| {
                    a.vehicles_managed.cmp(&b.vehicles_managed)
                }),
        ),
        (7, DisplayCell::new("Last login", |a: &Administrator| Content::text(a.last_login.clone()))),
    ])
}

pub fn administrator_filters() -> FilterConfigMap<Administrator> {
    FilterConfigMap::new()
        .with("name", FilterConfig::text("Name", "name"))
        .with("role", FilterConfig::select("Role", "role", ADMIN_ROLES.iter().copied(), true))
        .with("region", FilterConfig::select("Region", "region", REGIONS.iter().copied(), false))
        .with("active", FilterConfig::boolean("Active", "active"))
        .with("twoFactor", FilterConfig::boolean("2FA enabled", "twoFactor"))
        .with("vehiclesManaged", FilterConfig::number_range("Vehicles managed", "vehiclesManaged"))
        .with("lastLogin", FilterConfig::date_range("Last login", "lastLogin"))
}

pub fn administrator_actions() -> Vec<MultiSelectOption<Administrator>> {
    vec![
        MultiSelectOption::new("Copy emails", |rows: &[&Administrator], _ids: &HashSet<String>| {
            let emails = rows.iter().map(|a| a.email.as_str()).collect::<Vec<_>>().join(", ");
            copy_to_clipboard(emails)?;
            Ok(BulkOutcome::Message(format!("Copied {} addresses", rows.len())))
        })
        .icon("@"),
        MultiSelectOption::new("Revoke access", |rows: &[&Administrator], ids: &HashSet<String>| {
            debug!("Revoking {:?}", ids);
            info!("Revoking access of {} administrators", rows.len());
            Ok(BulkOutcome::Remove)
        })
        .variant(ActionVariant::Destructive)
        .tooltip("Removes the selected administrators"),
    ]
}

pub fn document_columns(today: NaiveDate) -> DisplayMap<Document> {
    DisplayMap::from([
        (
            0,
            DisplayCell::new("Document", |d: &Document| Content::text(d.name.clone()))
                .with_tooltip(|d: &Document| Content::text(format!("{} · {}", d.id, d.file_name))),
        ),
        (1, DisplayCell::new("Type", |d: &Document| Content::text(d.doc_type.clone()))),
        (2, DisplayCell::new("Vehicle", |d: &Document| Content::text(d.vehicle_plate.clone()))),
        (
            3,
            DisplayCell::new("Size", |d: &Document| Content::text(format!("{} KB", d.size_kb)))
                .with_compare(|a: &Document, b: &Document| a.size_kb.total_cmp(&b.size_kb)),
        ),
        (4, DisplayCell::new("Uploaded", |d: &Document| Content::text(d.uploaded_on.clone()))),
        (
            5,
            DisplayCell::new("Expires", move |d: &Document| expiry_cell(d.expires_on.as_deref(), today))
                .with_tooltip(move |d: &Document| expiry_tooltip(d.expires_on.as_deref(), today)),
        ),
        (6, DisplayCell::new("Verified", |d: &Document| flag(d.verified, "Verified", "Pending"))),
    ])
}

pub fn document_filters(today: NaiveDate) -> FilterConfigMap<Document> {
    FilterConfigMap::new()
        .with("name", FilterConfig::text("Name", "name"))
        .with("docType", FilterConfig::select("Type", "docType", DOCUMENT_TYPES.iter().copied(), true))
        .with("vehiclePlate", FilterConfig::text("Vehicle", "vehiclePlate"))
        .with("verified", FilterConfig::boolean("Verified", "verified"))
        .with("sizeKb", FilterConfig::number_range("Size (KB)", "sizeKb"))
        .with("expiresOn", FilterConfig::date_range("Expires", "expiresOn"))
        .with(
            "expiringWithin",
            FilterConfig::custom("Expiring within (days)", move |d: &Document, value: &FilterValue| {
                let days = match value {
                    FilterValue::Custom(serde_json::Value::Number(n)) => n.as_i64(),
                    FilterValue::Custom(serde_json::Value::String(s)) => s.trim().parse().ok(),
                    _ => None,
                };
                match days {
                    Some(limit) => d
                        .expires_on
                        .as_deref()
                        .and_then(|e| days_until(e, today))
                        .is_some_and(|left| (0..=limit).contains(&left)),
                    None => true,
                }
            })
            .with_editor(|value| match value {
                FilterValue::Custom(serde_json::Value::String(s)) => {
                    Content::text(format!("next {} days", s.trim()))
                }
                _ => Content::text("any"),
            }),
        )
}

pub fn document_actions() -> Vec<MultiSelectOption<Document>> {
    vec![
        MultiSelectOption::new("Copy file names", |rows: &[&Document], _ids: &HashSet<String>| {
            let names = rows.iter().map(|d| d.file_name.as_str()).collect::<Vec<_>>().join("\n");
            copy_to_clipboard(names)?;
            Ok(BulkOutcome::Message(format!("Copied {} file names", rows.len())))
        }),
        MultiSelectOption::new("Delete", |rows: &[&Document], _ids: &HashSet<String>| {
            info!("Deleting {} documents", rows.len());
            Ok(BulkOutcome::Remove)
        })
        .variant(ActionVariant::Destructive),
    ]
}
