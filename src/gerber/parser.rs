//! Semantic interpretation of the RS-274X subset in the external-interfaces
//! contract: format/unit/polarity/aperture state tracking and primitive
//! emission. Splitting raw bytes into `%...%` / `*`-terminated commands is
//! the only purely mechanical step; everything past that is interpretation.

use super::macro_expr;
use crate::error::{PcbCamError, Result};
use crate::geometry::{
    Aperture, ApertureMacro, ApertureShape, ArcDirection, FlashShape, MacroPrimitive, Point,
    Polarity, Primitive, TraceInterpolation,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZeroOmission {
    Leading,
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Units {
    Millimeters,
    Inches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormatSpec {
    omission: ZeroOmission,
    integer_digits: u32,
    decimal_digits: u32,
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self {
            omission: ZeroOmission::Leading,
            integer_digits: 2,
            decimal_digits: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    Linear,
    ClockwiseArc,
    CounterClockwiseArc,
}

/// The fully decoded output of a Gerber layer: the primitive set the
/// Polygon Builder consumes, plus any non-fatal issues encountered along
/// the way.
#[derive(Debug, Clone, Default)]
pub struct GerberDocument {
    pub primitives: Vec<Primitive>,
    pub warnings: Vec<String>,
}

struct ParseState {
    format: FormatSpec,
    units: Units,
    polarity: Polarity,
    interpolation: Interpolation,
    apertures: HashMap<u32, Aperture>,
    macros: HashMap<String, ApertureMacro>,
    current_aperture: Option<u32>,
    x: f64,
    y: f64,
    region_mode: bool,
    region_points: Vec<Point>,
    primitives: Vec<Primitive>,
    warnings: Vec<String>,
}

impl ParseState {
    fn new() -> Self {
        Self {
            format: FormatSpec::default(),
            units: Units::Millimeters,
            polarity: Polarity::Dark,
            interpolation: Interpolation::Linear,
            apertures: HashMap::new(),
            macros: HashMap::new(),
            current_aperture: None,
            x: 0.0,
            y: 0.0,
            region_mode: false,
            region_points: Vec::new(),
            primitives: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn unit_scale(&self) -> f64 {
        match self.units {
            Units::Millimeters => 1.0,
            Units::Inches => 25.4,
        }
    }

    fn decode_coordinate(&self, digits: &str) -> f64 {
        let (sign, digits) = match digits.strip_prefix('-') {
            Some(rest) => (-1.0, rest),
            None => (1.0, digits.strip_prefix('+').unwrap_or(digits)),
        };
        let total = (self.format.integer_digits + self.format.decimal_digits) as usize;
        let padded = match self.format.omission {
            ZeroOmission::Leading => format!("{:0>width$}", digits, width = total),
            ZeroOmission::Trailing => format!("{:0<width$}", digits, width = total),
        };
        let padded: String = if padded.len() > total {
            padded.chars().take(total).collect()
        } else {
            padded
        };
        let raw: i64 = padded.parse().unwrap_or(0);
        sign * (raw as f64) / 10f64.powi(self.format.decimal_digits as i32) * self.unit_scale()
    }
}

/// Parse the RS-274X subset described in the external-interfaces contract
/// into a primitive set. Malformed or unsupported constructs are recorded
/// as warnings and skipped rather than aborting the whole layer, matching
/// the parser's non-fatal accumulation policy.
pub fn parse(source: &str) -> Result<GerberDocument> {
    let mut state = ParseState::new();
    for command in split_commands(source) {
        process_command(&mut state, &command);
    }
    if state.region_mode && !state.region_points.is_empty() {
        state.warnings.push("unclosed region auto-closed at end of file".into());
        close_region(&mut state);
    }
    for warning in &state.warnings {
        log::warn!("gerber: {warning}");
    }
    log::debug!("gerber: parsed {} primitive(s)", state.primitives.len());
    Ok(GerberDocument {
        primitives: state.primitives,
        warnings: state.warnings,
    })
}

#[derive(Debug, Clone)]
enum Command {
    /// A `%...%` extended command, already stripped of delimiters, split
    /// into its `*`-terminated statements.
    Extended(Vec<String>),
    /// A single `*`-terminated standard command body.
    Standard(String),
}

fn split_commands(source: &str) -> Vec<Command> {
    let mut commands = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut pending = String::new();
    while i < chars.len() {
        match chars[i] {
            '%' => {
                if !pending.trim().is_empty() {
                    commands.push(Command::Standard(pending.trim().to_string()));
                }
                pending.clear();
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != '%' {
                    j += 1;
                }
                let body: String = chars[start..j].iter().collect();
                let statements: Vec<String> = body
                    .split('*')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                commands.push(Command::Extended(statements));
                i = j + 1;
            }
            '*' => {
                if !pending.trim().is_empty() {
                    commands.push(Command::Standard(pending.trim().to_string()));
                }
                pending.clear();
                i += 1;
            }
            c => {
                pending.push(c);
                i += 1;
            }
        }
    }
    if !pending.trim().is_empty() {
        commands.push(Command::Standard(pending.trim().to_string()));
    }
    commands
}

fn process_command(state: &mut ParseState, command: &Command) {
    match command {
        Command::Extended(statements) => process_extended(state, statements),
        Command::Standard(body) => process_standard(state, body),
    }
}

fn process_extended(state: &mut ParseState, statements: &[String]) {
    if statements.is_empty() {
        return;
    }
    let head = statements[0].as_str();
    if let Some(rest) = head.strip_prefix("FS") {
        parse_format_spec(state, rest);
    } else if let Some(rest) = head.strip_prefix("MO") {
        state.units = if rest.starts_with("IN") {
            Units::Inches
        } else {
            Units::Millimeters
        };
    } else if let Some(rest) = head.strip_prefix("LP") {
        state.polarity = if rest.starts_with('C') {
            Polarity::Clear
        } else {
            Polarity::Dark
        };
    } else if let Some(rest) = head.strip_prefix("AD") {
        parse_aperture_definition(state, rest);
    } else if let Some(rest) = head.strip_prefix("AM") {
        parse_aperture_macro(state, rest, &statements[1..]);
    }
    // Other extended commands (e.g. attributes) are silently accepted;
    // they carry no geometry the pipeline needs.
}

fn parse_format_spec(state: &mut ParseState, rest: &str) {
    // e.g. "LAX26Y26" -> leading-zero omit, absolute, X: 2 int/6 dec.
    let omission = if rest.starts_with('T') {
        ZeroOmission::Trailing
    } else {
        ZeroOmission::Leading
    };
    if let Some(x_pos) = rest.find('X') {
        let after_x = &rest[x_pos + 1..];
        let digits: String = after_x.chars().take(2).collect();
        if digits.len() == 2 {
            let int_digits = digits.chars().next().unwrap().to_digit(10);
            let dec_digits = digits.chars().nth(1).unwrap().to_digit(10);
            if let (Some(i), Some(d)) = (int_digits, dec_digits) {
                state.format = FormatSpec {
                    omission,
                    integer_digits: i,
                    decimal_digits: d,
                };
                return;
            }
        }
    }
    state.warnings.push(format!("unparsable format spec: FS{rest}"));
}

fn parse_aperture_definition(state: &mut ParseState, rest: &str) {
    let rest = match rest.strip_prefix('D') {
        Some(r) => r,
        None => {
            state.warnings.push(format!("malformed aperture definition: AD{rest}"));
            return;
        }
    };
    let digit_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let code: u32 = match rest[..digit_end].parse() {
        Ok(v) => v,
        Err(_) => {
            state.warnings.push(format!("malformed aperture code: AD{rest}"));
            return;
        }
    };
    let body = &rest[digit_end..];
    let (shape_code, modifiers_str) = match body.find(',') {
        Some(idx) => (&body[..idx], &body[idx + 1..]),
        None => (body, ""),
    };
    let modifiers: Vec<f64> = modifiers_str
        .split('X')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f64>().ok())
        .collect();
    let shape = match shape_code {
        "C" => ApertureShape::Circle {
            diameter: modifiers.first().copied().unwrap_or(0.0),
        },
        "R" => ApertureShape::Rect {
            w: modifiers.first().copied().unwrap_or(0.0),
            h: modifiers.get(1).copied().unwrap_or(0.0),
        },
        "O" => ApertureShape::Obround {
            w: modifiers.first().copied().unwrap_or(0.0),
            h: modifiers.get(1).copied().unwrap_or(0.0),
        },
        "P" => ApertureShape::Polygon {
            diameter: modifiers.first().copied().unwrap_or(0.0),
            vertices: modifiers.get(1).copied().unwrap_or(3.0) as u32,
            rotation: modifiers.get(2).copied().unwrap_or(0.0),
        },
        name => ApertureShape::Macro {
            name: name.to_string(),
            modifiers,
        },
    };
    state.apertures.insert(code, Aperture { code, shape });
}

fn parse_aperture_macro(state: &mut ParseState, name_part: &str, body: &[String]) {
    let name = name_part.trim().to_string();
    let empty_vars = HashMap::new();
    let mut primitives = Vec::new();
    let mut raw_statements = Vec::new();
    for statement in body {
        if let Some(p) = parse_macro_primitive(statement, &empty_vars) {
            primitives.push(p);
            raw_statements.push(statement.clone());
        } else {
            state
                .warnings
                .push(format!("unsupported macro primitive in {name}: {statement}"));
        }
    }
    state.macros.insert(
        name.clone(),
        ApertureMacro {
            name,
            primitives,
            raw_statements,
        },
    );
}

/// Parse one macro primitive statement, evaluating its expression fields
/// against `vars` (the `$n` modifier table). Called with an empty table at
/// macro-definition time and again with the flash's `AD` modifiers when a
/// flash referencing this macro needs variable-accurate geometry.
fn parse_macro_primitive(statement: &str, vars: &HashMap<u32, f64>) -> Option<MacroPrimitive> {
    let fields: Vec<&str> = statement.split(',').collect();
    if fields.is_empty() {
        return None;
    }
    let code: u32 = fields[0].trim().parse().ok()?;
    let num = |s: &str| macro_expr::eval(s.trim(), vars);
    match code {
        1 => {
            let exposure = num(fields.get(1)?) != 0.0;
            let diameter = num(fields.get(2)?);
            let cx = num(fields.get(3)?);
            let cy = num(fields.get(4)?);
            let rotation = fields.get(5).map(|s| num(s)).unwrap_or(0.0);
            Some(MacroPrimitive::Circle {
                exposure,
                diameter,
                center: Point::new(cx, cy),
                rotation,
            })
        }
        4 => {
            let exposure = num(fields.get(1)?) != 0.0;
            let n_vertices = num(fields.get(2)?) as usize;
            let mut points = Vec::with_capacity(n_vertices + 1);
            let mut idx = 3;
            for _ in 0..=n_vertices {
                let x = num(fields.get(idx)?);
                let y = num(fields.get(idx + 1)?);
                points.push(Point::new(x, y));
                idx += 2;
            }
            let rotation = fields.get(idx).map(|s| num(s)).unwrap_or(0.0);
            Some(MacroPrimitive::Outline {
                exposure,
                points,
                rotation,
            })
        }
        5 => {
            let exposure = num(fields.get(1)?) != 0.0;
            let vertices = num(fields.get(2)?) as u32;
            let cx = num(fields.get(3)?);
            let cy = num(fields.get(4)?);
            let diameter = num(fields.get(5)?);
            let rotation = num(fields.get(6)?);
            Some(MacroPrimitive::Polygon {
                exposure,
                vertices,
                center: Point::new(cx, cy),
                diameter,
                rotation,
            })
        }
        20 => {
            let exposure = num(fields.get(1)?) != 0.0;
            let width = num(fields.get(2)?);
            let x1 = num(fields.get(3)?);
            let y1 = num(fields.get(4)?);
            let x2 = num(fields.get(5)?);
            let y2 = num(fields.get(6)?);
            let rotation = num(fields.get(7)?);
            Some(MacroPrimitive::VectorLine {
                exposure,
                width,
                start: Point::new(x1, y1),
                end: Point::new(x2, y2),
                rotation,
            })
        }
        21 => {
            let exposure = num(fields.get(1)?) != 0.0;
            let w = num(fields.get(2)?);
            let h = num(fields.get(3)?);
            let cx = num(fields.get(4)?);
            let cy = num(fields.get(5)?);
            let rotation = num(fields.get(6)?);
            Some(MacroPrimitive::CenterLineRect {
                exposure,
                w,
                h,
                center: Point::new(cx, cy),
                rotation,
            })
        }
        22 => {
            let exposure = num(fields.get(1)?) != 0.0;
            let w = num(fields.get(2)?);
            let h = num(fields.get(3)?);
            let llx = num(fields.get(4)?);
            let lly = num(fields.get(5)?);
            let rotation = num(fields.get(6)?);
            Some(MacroPrimitive::LowerLeftRect {
                exposure,
                w,
                h,
                lower_left: Point::new(llx, lly),
                rotation,
            })
        }
        _ => None,
    }
}

fn process_standard(state: &mut ParseState, body: &str) {
    if body.starts_with("G01") {
        state.interpolation = Interpolation::Linear;
    } else if body.starts_with("G02") {
        state.interpolation = Interpolation::ClockwiseArc;
    } else if body.starts_with("G03") {
        state.interpolation = Interpolation::CounterClockwiseArc;
    } else if body.starts_with("G36") {
        state.region_mode = true;
        state.region_points.clear();
        state.region_points.push(Point::new(state.x, state.y));
    } else if body.starts_with("G37") {
        close_region(state);
    } else if body.starts_with("M02") {
        // end of file; nothing to flush beyond the final-unclosed-region
        // check performed by the caller.
    } else if let Some(rest) = body.strip_prefix('D') {
        let digit_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if let Ok(code) = rest[..digit_end].parse::<u32>() {
            if code >= 10 {
                state.current_aperture = Some(code);
                return;
            }
        }
        process_coordinate_command(state, body);
    } else if has_coordinate_fields(body) {
        process_coordinate_command(state, body);
    }
}

fn has_coordinate_fields(body: &str) -> bool {
    body.contains('X') || body.contains('Y') || body.contains('I') || body.contains('J')
}

fn extract_field(body: &str, key: char) -> Option<String> {
    let start = body.find(key)? + 1;
    let rest = &body[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '-' || c == '+'))
        .unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

fn process_coordinate_command(state: &mut ParseState, body: &str) {
    let new_x = extract_field(body, 'X')
        .map(|d| state.decode_coordinate(&d))
        .unwrap_or(state.x);
    let new_y = extract_field(body, 'Y')
        .map(|d| state.decode_coordinate(&d))
        .unwrap_or(state.y);
    let i = extract_field(body, 'I').map(|d| state.decode_coordinate(&d));
    let j = extract_field(body, 'J').map(|d| state.decode_coordinate(&d));

    let op_code = if body.ends_with("D01") {
        1
    } else if body.ends_with("D02") {
        2
    } else if body.ends_with("D03") {
        3
    } else {
        1
    };

    let start = Point::new(state.x, state.y);
    let end = Point::new(new_x, new_y);

    if state.region_mode {
        if op_code == 2 {
            if !state.region_points.is_empty() {
                close_region(state);
            }
            state.region_points.push(end);
        } else {
            state.region_points.push(end);
        }
        state.x = new_x;
        state.y = new_y;
        return;
    }

    match op_code {
        1 => emit_draw(state, start, end, i, j),
        3 => emit_flash(state, end),
        _ => {}
    }

    state.x = new_x;
    state.y = new_y;
}

fn emit_draw(state: &mut ParseState, start: Point, end: Point, i: Option<f64>, j: Option<f64>) {
    let width = aperture_draw_width(state);
    if start.distance(&end) < 1e-9 {
        return;
    }
    let interpolation = match (state.interpolation, i, j) {
        (Interpolation::Linear, _, _) => TraceInterpolation::Linear,
        (Interpolation::ClockwiseArc, Some(i), Some(j)) => TraceInterpolation::Arc {
            direction: ArcDirection::Clockwise,
            i,
            j,
        },
        (Interpolation::CounterClockwiseArc, Some(i), Some(j)) => TraceInterpolation::Arc {
            direction: ArcDirection::CounterClockwise,
            i,
            j,
        },
        _ => TraceInterpolation::Linear,
    };
    state.primitives.push(Primitive::Trace {
        start,
        end,
        width,
        interpolation,
        polarity: state.polarity,
    });
}

fn aperture_draw_width(state: &ParseState) -> f64 {
    match state.current_aperture.and_then(|c| state.apertures.get(&c)) {
        Some(Aperture {
            shape: ApertureShape::Circle { diameter },
            ..
        }) => *diameter,
        _ => 0.0,
    }
}

fn emit_flash(state: &mut ParseState, position: Point) {
    let aperture = state.current_aperture.and_then(|c| state.apertures.get(&c).cloned());
    let shape = match aperture {
        Some(Aperture {
            shape: ApertureShape::Circle { diameter },
            ..
        }) => FlashShape::Circle { diameter },
        Some(Aperture {
            shape: ApertureShape::Rect { w, h },
            ..
        }) => FlashShape::Rect { w, h },
        Some(Aperture {
            shape: ApertureShape::Obround { w, h },
            ..
        }) => FlashShape::Obround { w, h },
        Some(Aperture {
            shape: ApertureShape::Polygon {
                diameter,
                vertices,
                rotation,
            },
            ..
        }) => FlashShape::Polygon {
            points: regular_polygon(diameter / 2.0, vertices, rotation),
        },
        Some(Aperture {
            shape: ApertureShape::Macro { name, modifiers },
            ..
        }) => {
            if let Some(macro_def) = state.macros.get(&name) {
                let vars: HashMap<u32, f64> = modifiers
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i as u32 + 1, *v))
                    .collect();
                FlashShape::Polygon {
                    points: flatten_macro(macro_def, &vars),
                }
            } else {
                state.warnings.push(format!("undefined aperture macro: {name}"));
                FlashShape::Circle { diameter: 0.0 }
            }
        }
        None => {
            state.warnings.push("flash with no selected aperture".into());
            FlashShape::Circle { diameter: 0.0 }
        }
    };
    state.primitives.push(Primitive::Flash {
        position,
        shape,
        polarity: state.polarity,
    });
}

fn regular_polygon(radius: f64, vertices: u32, rotation_degrees: f64) -> Vec<Point> {
    let n = vertices.max(3);
    (0..n)
        .map(|k| {
            let theta = rotation_degrees.to_radians() + (k as f64) * std::f64::consts::TAU / (n as f64);
            Point::new(radius * theta.cos(), radius * theta.sin())
        })
        .collect()
}

/// Flatten a macro's primitive list into one outline for use as a flash
/// shape. Only the exposure-on primitive geometry contributes vertices;
/// this is a simplification of full macro rendering (which would itself
/// need a boolean union of each primitive's region), acceptable here
/// because macro apertures are rare relative to circle/rect/obround.
///
/// `vars` holds the `$n` modifiers supplied at this flash's `AD` site; when
/// non-empty each primitive is re-evaluated from its original statement
/// text rather than the all-zero-variable geometry cached on the macro
/// definition, so macros parametrized by their aperture's modifiers render
/// correctly per flash.
fn flatten_macro(macro_def: &ApertureMacro, vars: &HashMap<u32, f64>) -> Vec<Point> {
    let mut points = Vec::new();
    let resolved: Vec<MacroPrimitive>;
    let primitives: &[MacroPrimitive] = if vars.is_empty() {
        &macro_def.primitives
    } else {
        resolved = macro_def
            .raw_statements
            .iter()
            .filter_map(|stmt| parse_macro_primitive(stmt, vars))
            .collect();
        &resolved
    };
    for primitive in primitives {
        match primitive {
            MacroPrimitive::Circle {
                exposure,
                diameter,
                center,
                ..
            } if *exposure => {
                points.extend(regular_polygon(diameter / 2.0, 32, 0.0).into_iter().map(|p| {
                    Point::new(p.x + center.x, p.y + center.y)
                }));
            }
            MacroPrimitive::Outline {
                exposure, points: pts, ..
            } if *exposure => points.extend(pts.iter().copied()),
            MacroPrimitive::Polygon {
                exposure,
                vertices,
                center,
                diameter,
                rotation,
            } if *exposure => {
                points.extend(
                    regular_polygon(diameter / 2.0, *vertices, *rotation)
                        .into_iter()
                        .map(|p| Point::new(p.x + center.x, p.y + center.y)),
                );
            }
            MacroPrimitive::CenterLineRect {
                exposure,
                w,
                h,
                center,
                ..
            } if *exposure => {
                points.extend(
                    [
                        Point::new(-w / 2.0, -h / 2.0),
                        Point::new(w / 2.0, -h / 2.0),
                        Point::new(w / 2.0, h / 2.0),
                        Point::new(-w / 2.0, h / 2.0),
                    ]
                    .into_iter()
                    .map(|p| Point::new(p.x + center.x, p.y + center.y)),
                );
            }
            MacroPrimitive::LowerLeftRect {
                exposure,
                w,
                h,
                lower_left,
                ..
            } if *exposure => {
                points.extend(
                    [
                        Point::new(0.0, 0.0),
                        Point::new(*w, 0.0),
                        Point::new(*w, *h),
                        Point::new(0.0, *h),
                    ]
                    .into_iter()
                    .map(|p| Point::new(p.x + lower_left.x, p.y + lower_left.y)),
                );
            }
            _ => {}
        }
    }
    points
}

fn close_region(state: &mut ParseState) {
    if state.region_points.len() >= 3 {
        state.primitives.push(Primitive::Region {
            points: std::mem::take(&mut state.region_points),
            holes: Vec::new(),
            polarity: state.polarity,
        });
    } else if !state.region_points.is_empty() {
        state
            .warnings
            .push("region with fewer than 3 points discarded".into());
    }
    state.region_points.clear();
    state.region_mode = false;
}

/// Surface a configuration-level error for a malformed format block; parser
/// warnings cover everything recoverable, but an empty/garbage document
/// with no FS at all is treated as a fatal parse error by the caller if it
/// chooses to check `GerberDocument::primitives.is_empty()` alongside
/// warnings. This helper exists so callers that want a hard failure path
/// (rather than an empty, warning-laden document) have one.
pub fn parse_or_fail(source: &str) -> Result<GerberDocument> {
    let doc = parse(source)?;
    if doc.primitives.is_empty() && !source.trim().is_empty() {
        return Err(PcbCamError::ParseError(
            "no primitives decoded from non-empty input".into(),
        ));
    }
    Ok(doc)
}
