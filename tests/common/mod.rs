//! Common test utilities for classifier testing
//!
//! Builds labelled complaint CSV files in temporary directories.

#![allow(dead_code)]

use complaint_triage::ml::{ClassifierConfig, EnsembleConfig};
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

pub const HEADER: &str = "Comentario,Ciudad,Edad,Género,Nivel de urgencia,Zona rural,Acceso a internet,Atención previa del gobierno,Categoría del problema,Nivel_gravedad";

/// One CSV row with every column filled in
pub struct Row<'a> {
    pub comment: &'a str,
    pub city: &'a str,
    pub age: &'a str,
    pub gender: &'a str,
    pub urgency: &'a str,
    pub rural: &'a str,
    pub internet: &'a str,
    pub prior_attention: &'a str,
    pub category: &'a str,
    pub severity: &'a str,
}

impl<'a> Row<'a> {
    /// Row whose attributes match the prediction defaults
    pub fn with_defaults(comment: &'a str, severity: &'a str) -> Self {
        Self {
            comment,
            city: "Bogotá",
            age: "35",
            gender: "M",
            urgency: "No urgente",
            rural: "0",
            internet: "1",
            prior_attention: "1",
            category: "Salud",
            severity,
        }
    }

    fn to_csv(&self) -> String {
        [
            self.comment,
            self.city,
            self.age,
            self.gender,
            self.urgency,
            self.rural,
            self.internet,
            self.prior_attention,
            self.category,
            self.severity,
        ]
        .iter()
        .map(|v| {
            if v.contains(',') || v.contains('"') {
                format!("\"{}\"", v.replace('"', "\"\""))
            } else {
                v.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
    }
}

/// A CSV file living in its own temporary directory
pub struct Fixture {
    pub dir: TempDir,
    pub csv: PathBuf,
}

impl Fixture {
    pub fn model_path(&self) -> PathBuf {
        self.dir.path().join("model.bin")
    }
}

pub fn write_raw_csv(content: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("quejas.csv");
    let mut file = std::fs::File::create(&csv).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    Fixture { dir, csv }
}

pub fn write_csv(rows: &[Row]) -> Fixture {
    let mut content = String::from(HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(&row.to_csv());
        content.push('\n');
    }
    write_raw_csv(&content)
}

/// A small but realistic labelled dataset (40 rows, both classes)
pub fn realistic_rows() -> Vec<Row<'static>> {
    const GRAVE: [(&str, &str, &str, &str); 10] = [
        ("Faltan médicos en el hospital, es urgente", "Bogotá", "67", "Urgente"),
        ("No hay agua potable desde hace una semana", "Cali", "45", "Urgente"),
        ("Emergencia: el centro de salud cerró", "Pasto", "72", "Urgente"),
        ("Situación crítica, no hay doctor en el pueblo", "Neiva", "58", "Urgente"),
        ("Necesitamos ambulancia, la vía es peligrosa", "Montería", "61", "Moderada"),
        ("Falta medicina en el hospital regional", "Medellín", "80", "Urgente"),
        ("Grave contaminación del agua del río", "Barranquilla", "39", "Urgente"),
        ("Urgente: violencia en el barrio y sin atención médica", "Cartagena", "24", "Urgente"),
        ("No hay saneamiento básico, los niños enferman", "Villavicencio", "33", "Moderada"),
        ("Falta personal de salud en la zona rural", "Ibagué", "", "Urgente"),
    ];

    const MODERADO: [(&str, &str, &str, &str); 10] = [
        ("Necesitamos más bibliotecas en el barrio", "Bogotá", "22", "No urgente"),
        ("Mejorar el alumbrado del parque", "Manizales", "30", "No urgente"),
        ("Arreglar los andenes del centro", "Pereira", "41", "Moderada"),
        ("Más actividades culturales para jóvenes", "Cali", "19", "No urgente"),
        ("Pintar la escuela del sector", "Santa Marta", "36", "No urgente"),
        ("Queremos más zonas verdes", "Medellín", "28", "No urgente"),
        ("Ampliar el horario de la biblioteca", "Pasto", "25", "Moderada"),
        ("Organizar mejor la recolección de basuras", "Neiva", "50", "No urgente"),
        ("Más rutas de bus en la noche", "Cartagena", "", "No urgente"),
        ("Cursos de educación digital para adultos", "Ibagué", "63", "No urgente"),
    ];

    let mut rows = Vec::new();
    for round in 0..2 {
        for (i, &(comment, city, age, urgency)) in GRAVE.iter().enumerate() {
            rows.push(Row {
                comment,
                city,
                age,
                gender: if (i + round) % 2 == 0 { "F" } else { "M" },
                urgency,
                rural: if i % 3 == 0 { "1" } else { "0" },
                internet: if i % 2 == 0 { "0" } else { "1" },
                prior_attention: "0",
                category: "Salud",
                severity: if round == 0 { "GRAVE" } else { "grave" },
            });
        }
        for (i, &(comment, city, age, urgency)) in MODERADO.iter().enumerate() {
            rows.push(Row {
                comment,
                city,
                age,
                gender: if (i + round) % 2 == 0 { "M" } else { "F" },
                urgency,
                rural: "0",
                internet: "1",
                prior_attention: if i % 2 == 0 { "1" } else { "0" },
                category: if i % 2 == 0 { "Educación" } else { "Infraestructura" },
                severity: if i % 4 == 0 { "LEVE" } else { "MODERADO" },
            });
        }
    }
    rows
}

/// Default configuration with a smaller forest so tests stay quick
pub fn fast_config() -> ClassifierConfig {
    ClassifierConfig {
        ensemble: EnsembleConfig {
            n_trees: 40,
            ..EnsembleConfig::default()
        },
        ..ClassifierConfig::default()
    }
}
