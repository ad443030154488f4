//! Sealed cube registry

use std::collections::{HashMap, HashSet};

use super::cube::{Cube, Dimension, Measure};
use super::error::RegistryError;
use super::types::ValueKind;
use crate::plan::{Column, Expr};

/// The set of registered cubes.
///
/// A `Registry` can only be produced by [`RegistryBuilder::build`] and exposes
/// no way to add or change cubes afterwards. Share it behind an `Arc`.
#[derive(Debug)]
pub struct Registry {
    cubes: Vec<Cube>,
    index: HashMap<String, usize>,
}

/// A member reference resolved against the registry
#[derive(Debug, Clone, Copy)]
pub struct Member<'a> {
    pub cube: &'a Cube,
    pub kind: MemberKind<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum MemberKind<'a> {
    Measure(&'a Measure),
    Dimension(&'a Dimension),
}

impl<'a> Member<'a> {
    /// `Cube.member` path
    pub fn path(&self) -> String {
        format!("{}.{}", self.cube.name, self.name())
    }

    pub fn name(&self) -> &'a str {
        match self.kind {
            MemberKind::Measure(m) => &m.name,
            MemberKind::Dimension(d) => &d.name,
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        match self.kind {
            MemberKind::Measure(m) => m.value_kind(),
            MemberKind::Dimension(d) => d.kind,
        }
    }

    pub fn is_measure(&self) -> bool {
        matches!(self.kind, MemberKind::Measure(_))
    }

    pub fn as_measure(&self) -> Option<&'a Measure> {
        match self.kind {
            MemberKind::Measure(m) => Some(m),
            MemberKind::Dimension(_) => None,
        }
    }

    pub fn as_dimension(&self) -> Option<&'a Dimension> {
        match self.kind {
            MemberKind::Dimension(d) => Some(d),
            MemberKind::Measure(_) => None,
        }
    }

    /// Row-level expression for this member.
    ///
    /// Dimensions read their source column; measures produce their aggregate
    /// call, which is what HAVING predicates compare against.
    pub fn expr(&self) -> Expr {
        match self.kind {
            MemberKind::Dimension(d) => Expr::Column(Column::new(&self.cube.name, d.column_name())),
            MemberKind::Measure(m) => Expr::Aggregate {
                func: m.aggregation,
                arg: m
                    .sql
                    .as_ref()
                    .map(|col| Box::new(Expr::Column(Column::new(&self.cube.name, col)))),
            },
        }
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Get a cube by name
    pub fn get_cube(&self, name: &str) -> Option<&Cube> {
        self.index.get(name).map(|&i| &self.cubes[i])
    }

    pub fn cubes(&self) -> impl Iterator<Item = &Cube> {
        self.cubes.iter()
    }

    pub fn len(&self) -> usize {
        self.cubes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cubes.is_empty()
    }

    /// Resolve a `Cube.member` path
    pub fn member(&self, path: &str) -> Option<Member<'_>> {
        let (cube_name, member_name) = split_path(path)?;
        let cube = self.get_cube(cube_name)?;
        if let Some(m) = cube.get_measure(member_name) {
            return Some(Member { cube, kind: MemberKind::Measure(m) });
        }
        cube.get_dimension(member_name)
            .map(|d| Member { cube, kind: MemberKind::Dimension(d) })
    }
}

/// Split `Cube.member` into its parts. Anything but exactly two non-empty
/// parts is rejected.
pub fn split_path(path: &str) -> Option<(&str, &str)> {
    let (cube, member) = path.split_once('.')?;
    if cube.is_empty() || member.is_empty() || member.contains('.') {
        return None;
    }
    Some((cube, member))
}

/// Collects cube definitions and validates them into a [`Registry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    cubes: Vec<Cube>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cube(mut self, cube: Cube) -> Self {
        self.cubes.push(cube);
        self
    }

    pub fn add_cube(&mut self, cube: Cube) -> &mut Self {
        self.cubes.push(cube);
        self
    }

    /// Validate every cube and seal the registry
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut index = HashMap::new();
        for (i, cube) in self.cubes.iter().enumerate() {
            validate_name(&cube.name, &cube.name)?;
            if index.insert(cube.name.clone(), i).is_some() {
                return Err(RegistryError::DuplicateCube(cube.name.clone()));
            }
        }

        for cube in &self.cubes {
            validate_members(cube)?;
            for join in &cube.joins {
                if !index.contains_key(&join.cube) {
                    return Err(RegistryError::UnknownJoinTarget {
                        cube: cube.name.clone(),
                        target: join.cube.clone(),
                    });
                }
            }
            validate_event_stream(cube)?;
        }

        tracing::debug!(cubes = self.cubes.len(), "Cube registry sealed");
        Ok(Registry {
            cubes: self.cubes,
            index,
        })
    }
}

fn validate_name(cube: &str, name: &str) -> Result<(), RegistryError> {
    if name.is_empty() || name.contains('.') {
        return Err(RegistryError::InvalidName {
            cube: cube.to_string(),
            name: name.to_string(),
        });
    }
    Ok(())
}

fn validate_members(cube: &Cube) -> Result<(), RegistryError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for name in cube.member_names() {
        validate_name(&cube.name, name)?;
        if !seen.insert(name) {
            return Err(RegistryError::DuplicateMember {
                cube: cube.name.clone(),
                member: name.to_string(),
            });
        }
    }
    for measure in &cube.measures {
        if measure.sql.is_none() && !measure.aggregation.allows_missing_column() {
            return Err(RegistryError::MissingMeasureColumn {
                cube: cube.name.clone(),
                measure: measure.name.clone(),
            });
        }
    }
    Ok(())
}

fn validate_event_stream(cube: &Cube) -> Result<(), RegistryError> {
    let Some(stream) = &cube.event_stream else {
        return Ok(());
    };
    let invalid = |reason: String| RegistryError::InvalidEventStream {
        cube: cube.name.clone(),
        reason,
    };

    if cube.get_dimension(&stream.binding_key).is_none() {
        return Err(invalid(format!(
            "binding key '{}' is not a dimension",
            stream.binding_key
        )));
    }
    match cube.get_dimension(&stream.time_dimension) {
        Some(d) if d.is_time() => Ok(()),
        Some(_) => Err(invalid(format!(
            "'{}' is not a time dimension",
            stream.time_dimension
        ))),
        None => Err(invalid(format!(
            "time dimension '{}' is not a dimension",
            stream.time_dimension
        ))),
    }
}
