//! Which physics modules are active in a run, and the conserved-variable
//! buffers each one owns.
//!
//! Module presence is decided once, from the input deck, and carried around
//! as a [`PhysicsConfig`] value. The restart writer consults it to decide
//! which sections go into the payload; the restart reader rebuilds it from
//! the parameter text stored in the file.

use serde::{Deserialize, Serialize};
use crate::field::{FaceField, FieldArray};
use crate::mesh::RegionIndcs;
use crate::parameters::{ConfigError, ParameterInput};
use crate::rng::RngState;

/// Number of force components stored by the turbulence driver.
pub const NFORCE: usize = 3;




#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydroConfig {
    pub nhydro: usize,
    pub nscalars: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MhdConfig {
    pub nmhd: usize,
    pub nscalars: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadiationConfig {
    pub nangles: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcingConfig {
    pub seed: i64,
}




/// The set of active physics modules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub hydro: Option<HydroConfig>,
    pub mhd: Option<MhdConfig>,
    pub radiation: Option<RadiationConfig>,
    pub forcing: Option<ForcingConfig>,
}




// ============================================================================
impl HydroConfig {
    pub fn num_components(&self) -> usize {
        self.nhydro + self.nscalars
    }
}

impl MhdConfig {
    pub fn num_components(&self) -> usize {
        self.nmhd + self.nscalars
    }
}

impl RadiationConfig {
    /// Number of angles on a geodesic grid with `nlevel` subdivisions of
    /// each icosahedron edge.
    pub fn geodesic_angles(nlevel: usize) -> usize {
        10 * nlevel * nlevel + 2
    }
}




// ============================================================================
impl PhysicsConfig {

    /// Determine the active modules from the input deck. A module is active
    /// when its block (`<hydro>`, `<mhd>`, `<radiation>`, `<turb_driving>`)
    /// is present. Defaults for absent parameters are recorded in the deck.
    pub fn from_parameters(pin: &mut ParameterInput) -> Result<Self, ConfigError> {
        let hydro = if pin.has_block("hydro") {
            Some(HydroConfig {
                nhydro: positive(pin, "hydro", "nhydro", 5)?,
                nscalars: non_negative(pin, "hydro", "nscalars", 0)?,
            })
        } else {
            None
        };

        let mhd = if pin.has_block("mhd") {
            Some(MhdConfig {
                nmhd: positive(pin, "mhd", "nmhd", 5)?,
                nscalars: non_negative(pin, "mhd", "nscalars", 0)?,
            })
        } else {
            None
        };

        let radiation = if pin.has_block("radiation") {
            let nangles = match (pin.has_parameter("radiation", "nangles"), pin.has_parameter("radiation", "nlevel")) {
                (true, true) => {
                    return Err(ConfigError::Conflict(
                        "radiation/nangles and radiation/nlevel may not both be given".into()))
                }
                (true, false) => positive(pin, "radiation", "nangles", 1)?,
                (false, _) => RadiationConfig::geodesic_angles(positive(pin, "radiation", "nlevel", 4)?),
            };
            Some(RadiationConfig { nangles })
        } else {
            None
        };

        let forcing = if pin.has_block("turb_driving") {
            if hydro.is_none() && mhd.is_none() {
                return Err(ConfigError::MissingPrerequisite {
                    module: "turbulence driving",
                    prerequisite: "a <hydro> or <mhd> block",
                })
            }
            Some(ForcingConfig { seed: pin.get_or_add_integer("turb_driving", "rseed", -1)? })
        } else {
            None
        };

        Ok(Self { hydro, mhd, radiation, forcing })
    }
}

fn non_negative(pin: &mut ParameterInput, block: &str, key: &str, default: i64) -> Result<usize, ConfigError> {
    let n = pin.get_or_add_integer(block, key, default)?;

    if n < 0 {
        return Err(ConfigError::invalid_value(block, key, "must not be negative"))
    }
    Ok(n as usize)
}

fn positive(pin: &mut ParameterInput, block: &str, key: &str, default: i64) -> Result<usize, ConfigError> {
    let n = non_negative(pin, block, key, default)?;

    if n == 0 {
        return Err(ConfigError::invalid_value(block, key, "must be positive"))
    }
    Ok(n)
}




#[derive(Clone, Debug, PartialEq)]
pub struct Hydro {
    pub u0: FieldArray,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mhd {
    pub u0: FieldArray,
    pub b0: FaceField,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Radiation {
    pub i0: FieldArray,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Forcing {
    pub force: FieldArray,
    pub rstate: RngState,
}




/// Conserved-variable buffers of the active modules, for the blocks owned
/// by one rank.
#[derive(Clone, Debug, PartialEq)]
pub struct Physics {
    pub hydro: Option<Hydro>,
    pub mhd: Option<Mhd>,
    pub radiation: Option<Radiation>,
    pub forcing: Option<Forcing>,
}




// ============================================================================
impl Physics {

    /// Allocate zero-filled buffers for `nmb` blocks of the given shape.
    pub fn new(config: &PhysicsConfig, indcs: &RegionIndcs, nmb: usize) -> Self {
        let shape = indcs.padded_shape();

        Self {
            hydro: config.hydro.map(|h| Hydro {
                u0: FieldArray::zeros(nmb, h.num_components(), shape),
            }),
            mhd: config.mhd.map(|m| Mhd {
                u0: FieldArray::zeros(nmb, m.num_components(), shape),
                b0: FaceField::zeros(nmb, indcs),
            }),
            radiation: config.radiation.map(|r| Radiation {
                i0: FieldArray::zeros(nmb, r.nangles, shape),
            }),
            forcing: config.forcing.map(|f| Forcing {
                force: FieldArray::zeros(nmb, NFORCE, shape),
                rstate: RngState::seeded(f.seed),
            }),
        }
    }

    pub fn num_blocks(&self) -> usize {
        let arrays = [
            self.hydro.as_ref().map(|h| &h.u0),
            self.mhd.as_ref().map(|m| &m.u0),
            self.radiation.as_ref().map(|r| &r.i0),
            self.forcing.as_ref().map(|f| &f.force),
        ];
        arrays.iter().flatten().map(|a| a.num_blocks()).next().unwrap_or(0)
    }

    /// Every buffer of the active modules, in restart payload order.
    pub fn arrays_mut(&mut self) -> Vec<&mut FieldArray> {
        let mut arrays = Vec::new();

        if let Some(hydro) = &mut self.hydro {
            arrays.push(&mut hydro.u0)
        }
        if let Some(mhd) = &mut self.mhd {
            arrays.push(&mut mhd.u0);
            arrays.push(&mut mhd.b0.x1f);
            arrays.push(&mut mhd.b0.x2f);
            arrays.push(&mut mhd.b0.x3f);
        }
        if let Some(radiation) = &mut self.radiation {
            arrays.push(&mut radiation.i0)
        }
        if let Some(forcing) = &mut self.forcing {
            arrays.push(&mut forcing.force)
        }
        arrays
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{Physics, PhysicsConfig};
    use crate::mesh::RegionIndcs;
    use crate::parameters::{ConfigError, ParameterInput};

    #[test]
    fn modules_follow_input_blocks() {
        let mut pin = ParameterInput::parse("<hydro>\nnscalars = 2\n<radiation>\nnlevel = 2\n").unwrap();
        let config = PhysicsConfig::from_parameters(&mut pin).unwrap();
        assert_eq!(config.hydro.unwrap().num_components(), 7);
        assert_eq!(config.radiation.unwrap().nangles, 42);
        assert!(config.mhd.is_none());
        assert!(config.forcing.is_none());
        assert_eq!(pin.get_integer("hydro", "nhydro").unwrap(), 5);
    }

    #[test]
    fn forcing_without_fluid_is_rejected() {
        let mut pin = ParameterInput::parse("<turb_driving>\nrseed = 3\n").unwrap();
        assert!(matches!(
            PhysicsConfig::from_parameters(&mut pin),
            Err(ConfigError::MissingPrerequisite { .. })));
    }

    #[test]
    fn conflicting_angle_counts_are_rejected() {
        let mut pin = ParameterInput::parse("<radiation>\nnlevel = 2\nnangles = 42\n").unwrap();
        assert!(matches!(PhysicsConfig::from_parameters(&mut pin), Err(ConfigError::Conflict(_))));
    }

    #[test]
    fn buffers_have_padded_shapes() {
        let mut pin = ParameterInput::parse("<mhd>\n<turb_driving>\n").unwrap();
        let config = PhysicsConfig::from_parameters(&mut pin).unwrap();
        let physics = Physics::new(&config, &RegionIndcs::new(2, 4, 4, 1), 3);
        let mhd = physics.mhd.as_ref().unwrap();
        assert_eq!(mhd.u0.shape(), (8, 8, 1));
        assert_eq!(mhd.b0.x3f.shape(), (8, 8, 2));
        assert_eq!(physics.forcing.as_ref().unwrap().force.num_components(), 3);
        assert_eq!(physics.num_blocks(), 3);
    }

    #[test]
    fn arrays_are_listed_in_payload_order() {
        let mut pin = ParameterInput::parse("<mhd>\nnscalars = 1\n<turb_driving>\n").unwrap();
        let config = PhysicsConfig::from_parameters(&mut pin).unwrap();
        let mut physics = Physics::new(&config, &RegionIndcs::new(2, 4, 4, 4), 2);
        let ncomp: Vec<_> = physics.arrays_mut().iter().map(|a| a.num_components()).collect();
        assert_eq!(ncomp, vec![6, 1, 1, 1, 3]);
    }
}
