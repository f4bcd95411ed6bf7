// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wavefront OBJ parser using nom
//!
//! Handles the subset fragment files use: `v` with optional vertex colors,
//! `f` in all four index forms, `o`/`g` object splits. Texture coordinates,
//! normals, materials and smoothing groups are skipped.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till},
    character::complete::{i64 as int64, space0, space1},
    combinator::{map, opt, rest},
    multi::separated_list1,
    number::complete::double,
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::loader::{RawFragment, RawMesh};

/// One parsed statement
#[derive(Debug, Clone, PartialEq)]
enum Statement<'a> {
    Vertex([f32; 3], Option<[f32; 3]>),
    Face(Vec<i64>),
    Object(&'a str),
    Ignored,
}

fn triple(input: &str) -> IResult<&str, [f32; 3]> {
    map(
        tuple((
            double,
            preceded(space1, double),
            preceded(space1, double),
        )),
        |(x, y, z)| [x as f32, y as f32, z as f32],
    )(input)
}

/// Parse vertex: v x y z [r g b]
fn vertex(input: &str) -> IResult<&str, Statement> {
    map(
        preceded(
            pair(tag("v"), space1),
            pair(triple, opt(preceded(space1, triple))),
        ),
        |(position, color)| Statement::Vertex(position, color),
    )(input)
}

/// Face corner: `7`, `7/1`, `7//3`, `7/1/3`; only the position index is kept
fn face_corner(input: &str) -> IResult<&str, i64> {
    terminated(int64, take_till(|c: char| c.is_whitespace()))(input)
}

/// Parse face: f a b c ...
fn face(input: &str) -> IResult<&str, Statement> {
    map(
        preceded(pair(tag("f"), space1), separated_list1(space1, face_corner)),
        Statement::Face,
    )(input)
}

/// Parse object or group: o name / g name
fn object(input: &str) -> IResult<&str, Statement> {
    map(
        preceded(
            alt((tag("o"), tag("g"))),
            preceded(space0, rest),
        ),
        |name: &str| Statement::Object(name.trim()),
    )(input)
}

fn statement(line: &str) -> std::result::Result<Statement, String> {
    let keyword = line.split_whitespace().next().unwrap_or_default();
    let parsed = match keyword {
        "v" => vertex(line),
        "f" => face(line),
        "o" | "g" => object(line),
        _ => return Ok(Statement::Ignored),
    };
    parsed
        .map(|(_, s)| s)
        .map_err(|e| format!("malformed '{}' statement: {}", keyword, e))
}

#[derive(Debug, Default)]
struct ObjectBuilder {
    name: String,
    triangles: Vec<[usize; 3]>,
}

/// Resolve a 1-based or negative (relative) OBJ index against `count` vertices
fn resolve_index(index: i64, count: usize) -> Option<usize> {
    let resolved = match index {
        0 => return None,
        i if i > 0 => (i - 1) as usize,
        i => {
            let back = i.unsigned_abs() as usize;
            count.checked_sub(back)?
        }
    };
    (resolved < count).then_some(resolved)
}

/// Parse OBJ text into one [`RawMesh`] per object.
///
/// Objects without faces are dropped. Each mesh gets its own compact vertex
/// buffer; vertex colors are kept only when every vertex the mesh uses has
/// one.
pub fn parse_obj(fragment: &str, text: &str) -> Result<RawFragment> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut colors: Vec<Option<[f32; 3]>> = Vec::new();
    let mut objects = vec![ObjectBuilder {
        name: fragment.to_string(),
        ..ObjectBuilder::default()
    }];

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let err = |message: String| Error::ObjParse {
            fragment: fragment.to_string(),
            line: number + 1,
            message,
        };

        match statement(line).map_err(err)? {
            Statement::Vertex(p, c) => {
                positions.push(p);
                colors.push(c);
            }
            Statement::Face(corners) => {
                if corners.len() < 3 {
                    return Err(err(format!("face with {} vertices", corners.len())));
                }
                let resolved = corners
                    .iter()
                    .map(|&i| resolve_index(i, positions.len()))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| err("face index out of range".to_string()))?;
                let current = objects.last_mut().ok_or_else(|| err("no current object".to_string()))?;
                for k in 1..resolved.len() - 1 {
                    current.triangles.push([resolved[0], resolved[k], resolved[k + 1]]);
                }
            }
            Statement::Object(name) => {
                let name = if name.is_empty() { fragment } else { name };
                objects.push(ObjectBuilder {
                    name: name.to_string(),
                    ..ObjectBuilder::default()
                });
            }
            Statement::Ignored => {}
        }
    }

    let meshes = objects
        .into_iter()
        .filter(|o| !o.triangles.is_empty())
        .map(|o| compact(o, &positions, &colors))
        .collect();
    Ok(RawFragment { meshes })
}

fn compact(object: ObjectBuilder, positions: &[[f32; 3]], colors: &[Option<[f32; 3]>]) -> RawMesh {
    let mut remap: FxHashMap<usize, u32> = FxHashMap::default();
    let mut order: Vec<usize> = Vec::new();
    let mut indices = Vec::with_capacity(object.triangles.len() * 3);

    for tri in &object.triangles {
        for &global in tri {
            let local = *remap.entry(global).or_insert_with(|| {
                order.push(global);
                (order.len() - 1) as u32
            });
            indices.push(local);
        }
    }

    let local_positions: Vec<f32> = order.iter().flat_map(|&g| positions[g]).collect();
    let local_colors: Option<Vec<f32>> = order
        .iter()
        .map(|&g| colors[g])
        .collect::<Option<Vec<_>>>()
        .map(|c| c.into_iter().flatten().collect());

    RawMesh {
        name: object.name,
        positions: local_positions,
        indices: Some(indices),
        colors: local_colors,
    }
}
