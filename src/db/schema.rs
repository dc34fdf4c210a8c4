//! The fixed `dsr_table` definition.
//!
//! One column list drives the per-backend DDL, the insert template and the
//! schema description handed to the SQL generator.

use super::DatabaseBackend;

/// Name of the single table every question is answered from.
pub const TABLE_NAME: &str = "dsr_table";

/// Read statement used for operability checks; bypasses generation and validation.
pub const DIAGNOSTIC_QUERY: &str = "SELECT * FROM dsr_table LIMIT 50";

/// Storage class of a `dsr_table` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    DateTime,
    Text,
    VarChar(u16),
    Int,
}

impl ColumnKind {
    /// Returns the column type for the given backend.
    pub fn sql_type(&self, backend: DatabaseBackend) -> String {
        match (backend, self) {
            (DatabaseBackend::MySql, Self::DateTime) => "DATETIME".to_string(),
            (DatabaseBackend::MySql, Self::Text) => "TEXT".to_string(),
            (DatabaseBackend::MySql, Self::VarChar(len)) => format!("VARCHAR({len})"),
            (DatabaseBackend::MySql, Self::Int) => "INT".to_string(),
            (DatabaseBackend::Sqlite, Self::Int) => "INTEGER".to_string(),
            (DatabaseBackend::Sqlite, Self::DateTime) => "DATETIME".to_string(),
            (DatabaseBackend::Sqlite, _) => "TEXT".to_string(),
        }
    }
}

/// A column of `dsr_table` with a short description for the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub note: &'static str,
}

const fn col(name: &'static str, kind: ColumnKind, note: &'static str) -> ColumnDef {
    ColumnDef { name, kind, note }
}

/// Columns of `dsr_table`, in table order.
pub const COLUMNS: &[ColumnDef] = &[
    col("report_date", ColumnKind::DateTime, "Datetime the report was created."),
    col("station_name", ColumnKind::Text, "Fire station that responded."),
    col("call_category", ColumnKind::Text, "Top-level incident category, e.g. 'Fire related'."),
    col("reinforcement_reattended", ColumnKind::Text, "Whether reinforcement was needed ('Yes'/'No')."),
    col("time_out", ColumnKind::Text, "Time the crew left the station."),
    col("time_in", ColumnKind::Text, "Time the crew returned."),
    col("vehicle_no", ColumnKind::Text, "Registration of the responding vehicle."),
    col("lost_human", ColumnKind::Text, "Human lives lost."),
    col("saved_human", ColumnKind::Text, "Human lives saved."),
    col("lost_animal", ColumnKind::Text, "Animals lost."),
    col("saved_animal", ColumnKind::Text, "Animals rescued."),
    col("lost_value_rs", ColumnKind::Text, "Estimated loss in rupees."),
    col("saved_value_rs", ColumnKind::Text, "Estimated property saved in rupees."),
    col("dsr_activity", ColumnKind::Text, "Narrative of the operation performed."),
    col("near_location", ColumnKind::Text, "Landmark near the incident."),
    col("at_location", ColumnKind::Text, "Exact incident address or spot."),
    col("attended_by", ColumnKind::Text, "Personnel who attended."),
    col("sub_category", ColumnKind::Text, "Sub-classification within call_category."),
    col("taluka", ColumnKind::Text, "Administrative taluka."),
    col("city_village", ColumnKind::Text, "City or village of the incident."),
    col("additional_note_dsr", ColumnKind::Text, "Additional DSR notes."),
    col("additional_remarks", ColumnKind::Text, "Other remarks."),
    col("todays_dsr", ColumnKind::Text, "Summary of the day's DSR entry."),
    col("dsr_time_text", ColumnKind::Text, "Textual time context of the DSR."),
    col("lives_saved", ColumnKind::Text, "Lives saved (text)."),
    col("lives_lost", ColumnKind::Text, "Lives lost (text)."),
    col("total_lives_lost", ColumnKind::Text, "Cumulative lives lost."),
    col("latitude", ColumnKind::Text, "Latitude of the incident."),
    col("longitude", ColumnKind::Text, "Longitude of the incident."),
    col("month_year", ColumnKind::VarChar(10), "Month and year, e.g. 'Dec-2022'."),
    col("zone", ColumnKind::VarChar(50), "Administrative zone, e.g. '1. North Zone'."),
    col("weekday", ColumnKind::VarChar(10), "Day of the week."),
    col("hour_on_day", ColumnKind::VarChar(50), "Hour bucket, e.g. '0:00 to 2:00'."),
    col("numerical_year", ColumnKind::Int, "Four-digit year; use for year filters."),
    col("zone_and_city_village", ColumnKind::Text, "Zone combined with city/village."),
    col("overview_of_record", ColumnKind::Text, "Descriptive overview of the record."),
    col("taluka_village", ColumnKind::VarChar(100), "Taluka combined with village."),
    col("dsr_activity_and_note", ColumnKind::Text, "Activity narrative combined with notes."),
    col("near_and_at", ColumnKind::Text, "Near landmark combined with exact location."),
    col("near_at_and_by", ColumnKind::Text, "Location combined with attending personnel."),
    col("date_and_time", ColumnKind::DateTime, "Full datetime of the incident; use for temporal filters."),
    col("filter_reinforcement", ColumnKind::VarChar(50), "Simplified reinforcement status."),
];

/// Returns the column names in table order.
pub fn column_names() -> Vec<&'static str> {
    COLUMNS.iter().map(|c| c.name).collect()
}

/// Renders the idempotent `CREATE TABLE IF NOT EXISTS` statement for a backend.
pub fn create_table_sql(backend: DatabaseBackend) -> String {
    let columns = COLUMNS
        .iter()
        .map(|c| format!("    {} {}", c.name, c.kind.sql_type(backend)))
        .collect::<Vec<_>>()
        .join(",\n");

    format!("CREATE TABLE IF NOT EXISTS {TABLE_NAME} (\n{columns}\n)")
}

/// Renders the parameterized insert template covering every column.
///
/// Both supported backends use `?` placeholders.
pub fn insert_sql() -> String {
    let names = column_names().join(", ");
    let placeholders = vec!["?"; COLUMNS.len()].join(", ");
    format!("INSERT INTO {TABLE_NAME} ({names}) VALUES ({placeholders})")
}

/// Incident taxonomy: call categories and the sub-categories filed under each.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Emergency/Accident",
        &[
            "Mine flooding, open pit mine flooding",
            "Chemical/Oil spills",
            "Structure Collapse",
            "Air, Road, Sea and Rail accidents",
            "Major Liquified gas/ Chemical tanker/ receptacle incidents",
            "Person trapped",
            "Person rescued",
            "Drowning, suicide and other related incidents",
            "Accident in industry, storage and hazardous structure",
            "Near misses",
            "Other Emergency related incidents",
        ],
    ),
    (
        "Fire related",
        &[
            "Fire to &/or in a Highrise Buildings",
            "Fire to &/or in a commercial/ business/ assembly/ hospital/ educational structures",
            "Fire to &/or in a residential low rise structures, flat, house, village",
            "Fire to &/or in a slum area, huts, labour camp",
            "Fire to temporary structures",
            "Fires to &/or in Industries, Storage & Hazardous structures",
            "Dry Grass & field fires",
            "Wildland fires",
            "Electrical related fires",
            "Inflammable/toxic chemical & liquefied gas incidents",
            "Air, Road, Sea and Rail fire incidents",
            "Arson",
            "Garbage and Scrap Fire",
            "False alarms/ Unconfirmed",
            "Other Fire related incidents",
        ],
    ),
    (
        "Meteorological",
        &[
            "Cyclone, Storm Surge, Tornado, Convective Storm, Extratropical Storm, Wind",
            "Cloud Burst",
            "Cold Wave, Derecho",
            "Extreme Temperature, Fog, Frost, Freeze, Hail",
            "Lightning, Heavy Rain and Wind",
            "Sand-Storm, Dust-Storm",
            "Heat-wave",
        ],
    ),
    (
        "Hydrological",
        &[
            "Coastal Erosion",
            "Coastal flood",
            "Flash Flood Hydrological",
            "Flood Hydrological",
            "Drainage Management",
        ],
    ),
    (
        "Biological",
        &["Epidemics", "Insect infestations", "Animal stampedes", "Food poisoning"],
    ),
    (
        "Geophysical",
        &[
            "Landslides and mudflows",
            "Earthquakes",
            "Tsunami",
            "Dam failures/Dam Bursts",
        ],
    ),
    (
        "Climatological",
        &[
            "Drought",
            "Extreme hot/cold conditions",
            "Forest/Wildfire Fires",
            "Subsidence",
        ],
    ),
    (
        "Other Activities",
        &["Mock Drills", "Special Service Calls", "Other Activities"],
    ),
];

const GENERATION_RULES: &str = "\
You translate questions into a single MySQL 8.0 query over one table named `dsr_table`.
Each row of `dsr_table` is exactly one recorded incident.

Rules:
1. Prefix every column with `dsr_table.` and do not quote column names.
2. Enclose string literals in single quotes.
3. Use COUNT(*) for incident counts; count each row at most once, combining conditions with OR.
4. For 'total', 'sum', 'min', 'max', 'average' or 'count' questions return only the single aggregate value.
5. Filter years with dsr_table.numerical_year; never derive the year from text columns.
6. Filter zones with dsr_table.zone only; never infer a zone from a city, village or station.
7. Ignore records whose values are 'Nil' or '-', and records whose taluka_village is '(-) -'.
8. Search call_category, then sub_category, then dsr_activity before any other column.
9. For detail questions select only the columns the question needs, not every column.
10. A call's duration is TIMESTAMPDIFF(MINUTE, TIMESTAMP(report_date, time_in), TIMESTAMP(report_date, time_out)),
    excluding rows where time_in or time_out is NULL or empty.
11. The same question must always produce the same query.
";

/// Builds the schema description sent with every generation request.
pub fn schema_description() -> String {
    let mut out = String::from(GENERATION_RULES);

    out.push_str("\nCall categories and their sub-categories:\n");
    for (category, subs) in CATEGORIES {
        out.push_str(&format!("- {category}\n"));
        for sub in *subs {
            out.push_str(&format!("    - {sub}\n"));
        }
    }

    out.push_str("\nTable definition:\n");
    out.push_str(&create_table_sql(DatabaseBackend::MySql));
    out.push_str(";\n\nColumns:\n");
    for column in COLUMNS {
        out.push_str(&format!("- `{}`: {}\n", column.name, column.note));
    }

    out
}
