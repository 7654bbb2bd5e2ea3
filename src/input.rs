use itertools::Itertools;
use serde::Deserialize;

use crate::body::{BodyProperties, BodyType};
use crate::environment::Environment;
use crate::error::BodyError;

/// Body definition read from an input table
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRecord {
    pub id: usize,
    pub typ: BodyType,
    pub props: BodyProperties,
}

fn parse_f64(token: &str, field: &str) -> Result<f64, BodyError> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|_| BodyError::invalid_input(format!("cannot read {field} from '{token}'")))
}

/// Expands 1, 3 or 6 coefficients to the six body axes. A single value
/// applies to all translational axes; rotational axes default to zero.
fn expand_coefficients(values: &[f64], field: &str) -> Result<[f64; 6], BodyError> {
    let mut out = [0.; 6];
    match values.len() {
        1 => out[..3].fill(values[0]),
        3 => out[..3].copy_from_slice(values),
        6 => out.copy_from_slice(values),
        n => {
            return Err(BodyError::invalid_input(format!(
                "{field} needs 1, 3 or 6 values, got {n}"
            )))
        }
    }
    Ok(out)
}

fn split_list(token: &str) -> Vec<&str> {
    token
        .split([',', '|'])
        .filter(|s| !s.trim().is_empty())
        .collect_vec()
}

/// Parses one body row:
///
/// `ID [TYPE] X0 Y0 Z0 Xcg Ycg Zcg M V IX IY IZ CdA Ca`
///
/// `CdA` and `Ca` are either single tokens holding comma or `|` separated
/// lists (`1.0,1.0,2.0`) or three separate numbers each. The type defaults
/// to `FREE` when omitted.
pub fn parse_body_row(line: &str) -> Result<BodyRecord, BodyError> {
    let tokens = line.split_whitespace().collect_vec();
    if tokens.is_empty() {
        return Err(BodyError::invalid_input("empty body row"));
    }

    let id = tokens[0]
        .parse::<usize>()
        .map_err(|_| BodyError::invalid_input(format!("invalid body id '{}'", tokens[0])))?;

    let (typ, rest) = match tokens.get(1) {
        Some(t) if t.parse::<f64>().is_err() => (t.parse::<BodyType>()?, &tokens[2..]),
        _ => (BodyType::Free, &tokens[1..]),
    };

    const FIELDS: [&str; 11] = ["X0", "Y0", "Z0", "Xcg", "Ycg", "Zcg", "M", "V", "IX", "IY", "IZ"];
    if rest.len() < FIELDS.len() + 2 {
        return Err(BodyError::invalid_input(format!(
            "body {id}: expected at least {} values, got {}",
            FIELDS.len() + 2,
            rest.len()
        )));
    }
    let v = FIELDS
        .iter()
        .zip(rest.iter())
        .map(|(field, token)| parse_f64(token, field))
        .collect::<Result<Vec<_>, _>>()?;

    let coeffs = &rest[FIELDS.len()..];
    let (cda, ca) = match coeffs.len() {
        2 => (split_list(coeffs[0]), split_list(coeffs[1])),
        6 => (coeffs[..3].to_vec(), coeffs[3..].to_vec()),
        n => {
            return Err(BodyError::invalid_input(format!(
                "body {id}: cannot read drag and added-mass coefficients from {n} values"
            )))
        }
    };
    let cda = cda
        .iter()
        .map(|t| parse_f64(t, "CdA"))
        .collect::<Result<Vec<_>, _>>()?;
    let ca = ca
        .iter()
        .map(|t| parse_f64(t, "Ca"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BodyRecord {
        id,
        typ,
        props: BodyProperties {
            r6: [v[0], v[1], v[2], 0., 0., 0.],
            cg: [v[3], v[4], v[5]],
            mass: v[6],
            volume: v[7],
            inertia: [v[8], v[9], v[10]],
            cda: expand_coefficients(&cda, "CdA")?,
            ca: expand_coefficients(&ca, "Ca")?,
        },
    })
}

/// Parses a block of body rows, skipping blank lines and lines starting
/// with `#` or `-`
pub fn parse_body_table(text: &str) -> Result<Vec<BodyRecord>, BodyError> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('-'))
        .map(parse_body_row)
        .collect()
}

//------------------------------------------------------------------------------
// YAML configuration
//------------------------------------------------------------------------------

/// Body table and environment read from YAML
#[derive(Debug, Deserialize)]
pub struct BodyTable {
    #[serde(default)]
    pub environment: Environment,
    pub bodies: Vec<BodyConfig>,
}

#[derive(Debug, Deserialize)]
pub struct BodyConfig {
    pub id: usize,
    #[serde(rename = "type", default = "default_type")]
    pub typ: BodyType,
    /// Position, optionally followed by roll/pitch/yaw (rad)
    pub r6: Vec<f64>,
    #[serde(default)]
    pub cg: [f64; 3],
    pub mass: f64,
    pub volume: f64,
    pub inertia: [f64; 3],
    #[serde(default)]
    pub cda: Vec<f64>,
    #[serde(default)]
    pub ca: Vec<f64>,
}

fn default_type() -> BodyType {
    BodyType::Free
}

impl BodyConfig {
    pub fn to_record(&self) -> Result<BodyRecord, BodyError> {
        let mut r6 = [0.; 6];
        match self.r6.len() {
            3 | 6 => r6[..self.r6.len()].copy_from_slice(&self.r6),
            n => {
                return Err(BodyError::invalid_input(format!(
                    "body {}: r6 needs 3 or 6 values, got {n}",
                    self.id
                )))
            }
        }
        let coefficients = |values: &[f64], field: &str| {
            if values.is_empty() {
                Ok([0.; 6])
            } else {
                expand_coefficients(values, field)
            }
        };
        Ok(BodyRecord {
            id: self.id,
            typ: self.typ,
            props: BodyProperties {
                r6,
                cg: self.cg,
                mass: self.mass,
                volume: self.volume,
                inertia: self.inertia,
                cda: coefficients(&self.cda, "cda")?,
                ca: coefficients(&self.ca, "ca")?,
            },
        })
    }
}

impl BodyTable {
    pub fn records(&self) -> Result<Vec<BodyRecord>, BodyError> {
        self.bodies.iter().map(BodyConfig::to_record).collect()
    }
}

pub fn parse_body_config(yaml: &str) -> Result<BodyTable, BodyError> {
    serde_yaml::from_str(yaml).map_err(|e| BodyError::invalid_input(e.to_string()))
}

pub fn read_body_config(file_path: &str) -> Result<BodyTable, BodyError> {
    let yaml = std::fs::read_to_string(file_path)
        .map_err(|e| BodyError::invalid_input(format!("unable to read {file_path}: {e}")))?;
    parse_body_config(&yaml)
}
