// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fragment classification and naming.
//!
//! Fragment files follow the `D<tooth><section>_<part>.obj` convention
//! (`D11C_V.obj`, `D36R_MESIAL.obj`), but older assets use free-form names
//! such as `canal_21.obj`. [`classify`] handles both by keyword first and
//! section letter second; anything unrecognised is a crown.

use dentchart_scene::{ComponentType, ToothId};
use nom::{
    bytes::complete::{tag_no_case, take_while_m_n},
    character::complete::{alphanumeric1, char, satisfy},
    combinator::{eof, map_res},
    sequence::terminated,
    IResult,
};

/// `D`, two digits, a section letter and `_`.
fn tooth_prefix(input: &str) -> IResult<&str, (u8, char)> {
    let (input, _) = tag_no_case("d")(input)?;
    let (input, tooth) = map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_digit()), str::parse::<u8>)(input)?;
    let (input, section) = satisfy(|c: char| c.is_ascii_alphabetic())(input)?;
    let (input, _) = char('_')(input)?;
    Ok((input, (tooth, section.to_ascii_uppercase())))
}

fn tooth_digits(input: &str) -> IResult<&str, u8> {
    let (input, _) = tag_no_case("d")(input)?;
    map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_digit()), str::parse::<u8>)(input)
}

/// A fragment file name split into its structured parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentFileName {
    pub tooth: u8,
    /// Upper-case section letter (`C`, `R`, `N`, ...)
    pub section: char,
    pub part: String,
}

fn fragment_file(input: &str) -> IResult<&str, ((u8, char), &str)> {
    let (input, prefix) = tooth_prefix(input)?;
    let (input, part) = terminated(alphanumeric1, tag_no_case(".obj"))(input)?;
    let (input, _) = eof(input)?;
    Ok((input, (prefix, part)))
}

/// Parses `D<2 digits><letter>_<alphanumeric>.obj`, case-insensitively.
pub fn parse_fragment_file_name(file_name: &str) -> Option<FragmentFileName> {
    fragment_file(file_name)
        .ok()
        .map(|(_, ((tooth, section), part))| FragmentFileName {
            tooth,
            section,
            part: part.to_string(),
        })
}

/// Identity of a fragment: base file name without directory or extension.
pub fn fragment_base(name: &str) -> &str {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    }
}

/// File name to request from the asset store, `.obj` appended when missing.
pub fn obj_file_name(name: &str) -> String {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if file.to_ascii_lowercase().ends_with(".obj") {
        file.to_string()
    } else {
        format!("{}.obj", file)
    }
}

/// Tooth id encoded at the start of a mesh or fragment name (`D11...`).
pub fn tooth_id_from_name(name: &str) -> Option<ToothId> {
    tooth_digits(fragment_base(name)).ok().and_then(|(_, n)| ToothId::new(n))
}

fn has_nucleus_token(lower: &str) -> bool {
    if lower.contains("nuc") || lower.contains("nuç") || lower.contains("núcleo") {
        return true;
    }
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|segment| segment == "n")
}

/// Maps a fragment file name to its anatomical component.
///
/// First match wins: implant or abutment, canal, root, nucleus keyword,
/// then the `D##<section>_` letter (`r` root, `n` nucleus, `c` crown).
/// Unrecognised names are crowns.
pub fn classify(filename: &str) -> ComponentType {
    let lower = filename.to_lowercase();
    if lower.contains("implant") || lower.contains("abu") {
        return ComponentType::Implant;
    }
    if lower.contains("canal") {
        return ComponentType::Canal;
    }
    if lower.contains("raiz") || lower.contains("raíz") || lower.contains("root") {
        return ComponentType::Root;
    }
    if has_nucleus_token(&lower) {
        return ComponentType::Nucleus;
    }
    match tooth_prefix(fragment_base(filename)) {
        Ok((_, (_, 'R'))) => ComponentType::Root,
        Ok((_, (_, 'N'))) => ComponentType::Nucleus,
        _ => ComponentType::Tooth,
    }
}
