use itertools::Itertools;
use tracing::debug;

use crate::body::{Body, BodyProperties, BodyType};
use crate::environment::Environment;
use crate::error::BodyError;
use crate::input::{BodyRecord, BodyTable};

struct ConnectionInput {
    body: usize,
    index: usize,
    coords: [f64; 3],
}

struct RodInput {
    body: usize,
    index: usize,
    end_coords: [f64; 6],
}

/// Collects body definitions and attachments during model loading and
/// creates validated bodies from them
pub struct Model {
    environment: Environment,
    records: Vec<BodyRecord>,
    connections: Vec<ConnectionInput>,
    rods: Vec<RodInput>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// Creates and initializes a model
    pub fn new() -> Model {
        Model {
            environment: Environment::default(),
            records: vec![],
            connections: vec![],
            rods: vec![],
        }
    }

    /// Creates a model from a YAML body table
    pub fn from_table(table: &BodyTable) -> Result<Model, BodyError> {
        let mut model = Model::new();
        model.environment = table.environment.clone();
        for rec in table.records()? {
            model.add_record(rec);
        }
        Ok(model)
    }

    /// Set the gravitational acceleration magnitude
    pub fn set_gravity(&mut self, g: f64) {
        self.environment.gravity = g;
    }

    pub fn set_water_density(&mut self, rho: f64) {
        self.environment.water_density = rho;
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn n_bodies(&self) -> usize {
        self.records.len()
    }

    /// Adds a parsed body definition and returns its position in the model
    pub fn add_record(&mut self, record: BodyRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Creates and returns a body builder for adding a new body to the model.
    ///
    /// The body id defaults to its one-based position in the model.
    pub fn add_body(&mut self) -> BodyBuilder<'_> {
        let n = self.records.len();
        self.records.push(BodyRecord {
            id: n + 1,
            typ: BodyType::Free,
            props: BodyProperties {
                r6: [0.; 6],
                cg: [0.; 3],
                mass: 0.,
                volume: 0.,
                inertia: [0.; 3],
                cda: [0.; 6],
                ca: [0.; 6],
            },
        });
        BodyBuilder {
            record: &mut self.records[n],
            index: n,
        }
    }

    /// Attaches connection `index` to the body at model position `body`
    pub fn attach_connection(&mut self, body: usize, index: usize, coords: [f64; 3]) {
        self.connections.push(ConnectionInput {
            body,
            index,
            coords,
        });
    }

    /// Attaches rod `index` to the body at model position `body`
    pub fn attach_rod(&mut self, body: usize, index: usize, end_coords: [f64; 6]) {
        self.rods.push(RodInput {
            body,
            index,
            end_coords,
        });
    }

    /// Validates every body definition and attachment and creates the bodies
    /// in model order
    pub fn create_bodies(&self) -> Result<Vec<Body>, BodyError> {
        if let Some(id) = self.records.iter().map(|r| r.id).duplicates().next() {
            return Err(BodyError::invalid_input(format!("duplicate body id {id}")));
        }

        let mut bodies = self
            .records
            .iter()
            .map(|r| Body::setup(r.id, r.typ, r.props.clone(), &self.environment))
            .collect::<Result<Vec<_>, _>>()?;

        for c in &self.connections {
            let body = bodies.get_mut(c.body).ok_or_else(|| {
                BodyError::invalid_input(format!("connection {} attached to missing body", c.index))
            })?;
            body.add_connection_to_body(c.index, c.coords)?;
        }
        for r in &self.rods {
            let body = bodies.get_mut(r.body).ok_or_else(|| {
                BodyError::invalid_input(format!("rod {} attached to missing body", r.index))
            })?;
            body.add_rod_to_body(r.index, r.end_coords)?;
        }

        debug!(
            bodies = bodies.len(),
            connections = self.connections.len(),
            rods = self.rods.len(),
            "created bodies"
        );
        Ok(bodies)
    }
}

pub struct BodyBuilder<'a> {
    record: &'a mut BodyRecord,
    index: usize,
}

impl BodyBuilder<'_> {
    pub fn id(self, id: usize) -> Self {
        self.record.id = id;
        self
    }

    pub fn body_type(self, typ: BodyType) -> Self {
        self.record.typ = typ;
        self
    }

    pub fn position(self, x: f64, y: f64, z: f64) -> Self {
        self.record.props.r6[..3].copy_from_slice(&[x, y, z]);
        self
    }

    /// Roll, pitch and yaw (rad)
    pub fn orientation(self, roll: f64, pitch: f64, yaw: f64) -> Self {
        self.record.props.r6[3..].copy_from_slice(&[roll, pitch, yaw]);
        self
    }

    pub fn cg(self, x: f64, y: f64, z: f64) -> Self {
        self.record.props.cg = [x, y, z];
        self
    }

    pub fn mass(self, mass: f64) -> Self {
        self.record.props.mass = mass;
        self
    }

    pub fn volume(self, volume: f64) -> Self {
        self.record.props.volume = volume;
        self
    }

    pub fn inertia(self, ix: f64, iy: f64, iz: f64) -> Self {
        self.record.props.inertia = [ix, iy, iz];
        self
    }

    pub fn drag(self, cda: [f64; 6]) -> Self {
        self.record.props.cda = cda;
        self
    }

    pub fn added_mass(self, ca: [f64; 6]) -> Self {
        self.record.props.ca = ca;
        self
    }

    /// Returns the body's position in the model
    pub fn build(self) -> usize {
        self.index
    }
}
