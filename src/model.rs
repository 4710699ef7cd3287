//! Tile mesh: Wavefront OBJ loading (positions, normals, triangles) and bounds.

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: malformed number {token:?}")]
    BadNumber { line: usize, token: String },
    #[error("line {line}: face must have exactly 3 corners, found {found}")]
    NotATriangle { line: usize, found: usize },
    #[error("line {line}: corner {token:?} uses different vertex and normal indices")]
    SplitIndex { line: usize, token: String },
    #[error("line {line}: index {index} outside 1..={max}")]
    IndexOutOfRange { line: usize, index: u32, max: usize },
    #[error("{vertices} vertices but {normals} normals")]
    NormalCountMismatch { vertices: usize, normals: usize },
    #[error("model has no faces")]
    Empty,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    /// Half the box size along each axis.
    pub fn half_extents(&self) -> [f32; 3] {
        [
            (self.max[0] - self.min[0]) / 2.0,
            (self.max[1] - self.min[1]) / 2.0,
            (self.max[2] - self.min[2]) / 2.0,
        ]
    }
}

/// Triangle mesh read from an OBJ file. Indices are 0-based.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
    pub bounds: Bounds,
}

impl Mesh {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let source = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mesh = Self::parse(&name, &source)?;
        let Bounds { min, max } = mesh.bounds;
        log::info!(
            "loaded {}: {} vertices, {} faces, x {}..{}, y {}..{}, z {}..{}",
            mesh.name,
            mesh.vertices.len(),
            mesh.faces.len(),
            min[0],
            max[0],
            min[1],
            max[1],
            min[2],
            max[2]
        );
        Ok(mesh)
    }

    /// Parse OBJ text. Every vertex needs a normal with the same index.
    pub fn parse(name: &str, source: &str) -> Result<Self, ModelError> {
        let mut vertices = Vec::new();
        let mut normals = Vec::new();
        let mut faces: Vec<([u32; 3], usize)> = Vec::new();

        for (i, raw) in source.lines().enumerate() {
            let line = i + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut tokens = trimmed.split_whitespace();
            match tokens.next() {
                Some("v") => vertices.push(parse_vec3(line, tokens)?),
                Some("vn") => normals.push(parse_vec3(line, tokens)?),
                // Texture coordinates are not drawn.
                Some("vt") => {}
                Some("f") => faces.push((parse_face(line, tokens)?, line)),
                _ => log::warn!("ignoring unidentified line in {}: {}", name, trimmed),
            }
        }

        if vertices.len() != normals.len() {
            return Err(ModelError::NormalCountMismatch {
                vertices: vertices.len(),
                normals: normals.len(),
            });
        }
        if faces.is_empty() {
            return Err(ModelError::Empty);
        }
        for &(face, line) in &faces {
            if let Some(&index) = face.iter().find(|&&ix| ix as usize >= vertices.len()) {
                return Err(ModelError::IndexOutOfRange {
                    line,
                    index: index + 1,
                    max: vertices.len(),
                });
            }
        }

        let bounds = bounds_of(&vertices);
        Ok(Self {
            name: name.to_string(),
            vertices,
            normals,
            faces: faces.into_iter().map(|(f, _)| f).collect(),
            bounds,
        })
    }

    /// How squarely the surface faces the viewer (+Z) once the mesh is turned
    /// `angle` degrees about Y: mean |z| of the rotated unit normals.
    /// 1.0 for a flat tile seen head-on.
    pub fn facing(&self, angle: f32) -> f32 {
        let (sin, cos) = angle.to_radians().sin_cos();
        let (sum, count) = self
            .normals
            .iter()
            .filter_map(|&[x, y, z]| {
                let len = (x * x + y * y + z * z).sqrt();
                (len > f32::EPSILON).then(|| ((z * cos - x * sin) / len).abs())
            })
            .fold((0.0f32, 0usize), |(sum, count), f| (sum + f, count + 1));
        if count == 0 { 1.0 } else { sum / count as f32 }
    }
}

fn parse_number(line: usize, token: &str) -> Result<f32, ModelError> {
    token.parse::<f32>().map_err(|_| ModelError::BadNumber {
        line,
        token: token.to_string(),
    })
}

fn parse_vec3<'a>(line: usize, mut tokens: impl Iterator<Item = &'a str>) -> Result<[f32; 3], ModelError> {
    let mut out = [0.0f32; 3];
    for slot in &mut out {
        let token = tokens.next().unwrap_or("");
        *slot = parse_number(line, token)?;
    }
    Ok(out)
}

/// Corners are `v`, `v//n` or `v/t/n`; when a normal index is present it must equal the vertex index.
fn parse_face<'a>(line: usize, tokens: impl Iterator<Item = &'a str>) -> Result<[u32; 3], ModelError> {
    let corners: Vec<&str> = tokens.collect();
    if corners.len() != 3 {
        return Err(ModelError::NotATriangle {
            line,
            found: corners.len(),
        });
    }
    let mut out = [0u32; 3];
    for (slot, token) in out.iter_mut().zip(&corners) {
        let mut parts = token.split('/');
        let vertex = parse_index(line, parts.next().unwrap_or(""))?;
        if let Some(normal) = parts.nth(1).filter(|s| !s.is_empty()) {
            if parse_index(line, normal)? != vertex {
                return Err(ModelError::SplitIndex {
                    line,
                    token: (*token).to_string(),
                });
            }
        }
        *slot = vertex - 1;
    }
    Ok(out)
}

fn parse_index(line: usize, token: &str) -> Result<u32, ModelError> {
    match token.parse::<u32>() {
        Ok(0) => Err(ModelError::IndexOutOfRange {
            line,
            index: 0,
            max: 0,
        }),
        Ok(ix) => Ok(ix),
        Err(_) => Err(ModelError::BadNumber {
            line,
            token: token.to_string(),
        }),
    }
}

fn bounds_of(vertices: &[[f32; 3]]) -> Bounds {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for v in vertices {
        for axis in 0..3 {
            min[axis] = min[axis].min(v[axis]);
            max[axis] = max[axis].max(v[axis]);
        }
    }
    Bounds { min, max }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TETRA: &str = "# tetrahedron
v 0 0 0
v 1 0 0
v 0 2 0
v 0 0 -1
vn 0 0 1
vn 0 0 1
vn 0 0 1
vn 0 0 1
vt 0.5 0.5
f 1//1 2//2 3//3
f 1/1/1 3/1/3 4/1/4

s off
";

    #[test]
    fn test_parse_tetrahedron() {
        let mesh = Mesh::parse("tetra.obj", TETRA).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(mesh.bounds.min, [0.0, 0.0, -1.0]);
        assert_eq!(mesh.bounds.max, [1.0, 2.0, 0.0]);
        assert_eq!(mesh.bounds.half_extents(), [0.5, 1.0, 0.5]);
    }

    #[test]
    fn test_facing_follows_normals() {
        let flat = Mesh::parse(
            "quad.obj",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvn 0 0 2\nvn 0 0 1\nf 1 2 3\n",
        )
        .unwrap();
        assert!((flat.facing(0.0) - 1.0).abs() < 1e-6);
        assert!(flat.facing(90.0) < 1e-6);
        assert!((flat.facing(180.0) - 1.0).abs() < 1e-6);

        let side = Mesh::parse(
            "side.obj",
            "v 0 0 0\nv 0 1 0\nv 0 0 1\nvn 1 0 0\nvn 1 0 0\nvn 1 0 0\nf 1 2 3\n",
        )
        .unwrap();
        assert!(side.facing(0.0) < 1e-6);
        assert!((side.facing(90.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_split_index_rejected() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvn 0 0 1\nvn 0 0 1\nf 1//2 2//2 3//3\n";
        let err = Mesh::parse("bad.obj", src).unwrap_err();
        assert!(matches!(err, ModelError::SplitIndex { line: 7, .. }));
    }

    #[test]
    fn test_index_out_of_range() {
        let src = "v 0 0 0\nvn 0 0 1\nf 1 1 2\n";
        let err = Mesh::parse("bad.obj", src).unwrap_err();
        assert!(matches!(err, ModelError::IndexOutOfRange { line: 3, index: 2, max: 1 }));
    }

    #[test]
    fn test_quad_rejected() {
        let src = "v 0 0 0\nvn 0 0 1\nf 1 1 1 1\n";
        let err = Mesh::parse("bad.obj", src).unwrap_err();
        assert!(matches!(err, ModelError::NotATriangle { found: 4, .. }));
    }

    #[test]
    fn test_missing_normals_rejected() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let err = Mesh::parse("bad.obj", src).unwrap_err();
        assert!(matches!(
            err,
            ModelError::NormalCountMismatch { vertices: 3, normals: 0 }
        ));
    }

    #[test]
    fn test_bad_number_and_empty() {
        let err = Mesh::parse("bad.obj", "v 0 zero 0\n").unwrap_err();
        assert!(matches!(err, ModelError::BadNumber { line: 1, .. }));
        let err = Mesh::parse("empty.obj", "# nothing\n").unwrap_err();
        assert!(matches!(err, ModelError::Empty));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Mesh::load(Path::new("/nonexistent/tile.obj")).unwrap_err();
        assert!(matches!(err, ModelError::Io(_)));
    }
}
