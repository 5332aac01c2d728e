//! `.tri` triangle-mesh serializer.
//!
//! A `.tri` file stores a connected set of colored triangles covering a
//! `width x height` image. The first ("root") triangle is written in
//! full; every other triangle is written relative to the triangle it
//! was discovered from in a breadth-first walk of the adjacency graph,
//! so it only needs the one vertex its parent does not already hold.
//!
//! ## Layout (little-endian)
//!
//! ```text
//! u16 width
//! u16 height
//! u8  root adjacency count
//! u16 x0, u16 y0, u16 x1, u16 y1, u16 x2, u16 y2
//! u8  r, u8 g, u8 b
//! per non-root triangle, in breadth-first order:
//!   u8 header  bits 0-1 tree children
//!              bits 2-3 parent face
//!              bit  4   compressed coordinate
//!              bit  5   compressed color
//!              bits 6-7 bits 4-5 of the biased blue delta
//!   compressed coordinate: i8 dx, i8 dy   else u16 x, u16 y
//!   compressed color:      u16 packed      else u8 r, u8 g, u8 b
//! ```
//!
//! The coordinate delta is taken from the parent's vertex in the slot
//! numbered by the parent face. Color deltas are per channel against the
//! parent's quantized color, biased by +32 into 6-bit fields: red in
//! bits 0-5 of the packed word, green in bits 6-11, the low four bits of
//! blue in bits 12-15 and its high two bits in the header byte.
//!
//! There is no triangle count: a reader knows it is done when every
//! announced child has been read.
//!
//! [`encode_tri`] is a pure function with no I/O; [`write_tri`] wraps
//! it for any [`std::io::Write`] sink.

use std::io::Write;
use std::ops::RangeInclusive;

use tessel_mesh::{
    ColoredTriangle, Dimensions, Face, MeshError, Point, Rgb8, SpanningTree, Triangle,
    canonicalize_all,
};

/// Coordinate deltas in this range are written as two `i8`s.
pub const COORD_DELTA_RANGE: RangeInclusive<i32> = -128..=127;

/// Per-channel color deltas in this range are written as one packed `u16`.
pub const COLOR_DELTA_RANGE: RangeInclusive<i32> = -32..=31;

/// Added to each color delta so it fits an unsigned 6-bit field.
const COLOR_BIAS: i32 = 32;

/// Largest child count the 2-bit header field can hold.
pub const MAX_CHILDREN: usize = 3;

const FLAG_COMPRESSED_COORD: u8 = 1 << 4;
const FLAG_COMPRESSED_COLOR: u8 = 1 << 5;

/// Errors raised while encoding a mesh.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The triangle set cannot be walked as a single spanning tree.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Width or height does not fit in 16 bits.
    #[error("image dimensions {width}x{height} exceed 65535")]
    DimensionsTooLarge { width: u32, height: u32 },

    /// The output sink failed.
    #[error("failed to write mesh: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while decoding a `.tri` byte stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The stream ended in the middle of a record.
    #[error("unexpected end of data at byte {offset}")]
    UnexpectedEof { offset: usize },

    /// Bytes remain after every announced triangle was read.
    #[error("trailing data after the last triangle at byte {offset}")]
    TrailingBytes { offset: usize },

    /// A header named a parent face other than 0, 1 or 2.
    #[error("invalid face {value} in record at byte {offset}")]
    InvalidFace { offset: usize, value: u8 },

    /// A coordinate delta landed outside the 16-bit range.
    #[error("coordinate out of range in record at byte {offset}")]
    CoordinateOutOfRange { offset: usize },

    /// A color delta landed outside `0..=255`.
    #[error("color out of range in record at byte {offset}")]
    ColorOutOfRange { offset: usize },
}

/// The fields of a non-root record's header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Number of tree children announced by this triangle (0-3).
    pub children: u8,
    /// Face of the shared edge on the parent.
    pub parent_face: Face,
    /// Whether the new vertex is an `i8` delta pair.
    pub compressed_coord: bool,
    /// Whether the color is a packed `u16` delta word.
    pub compressed_color: bool,
    /// Bits 4-5 of the biased blue delta.
    pub blue_high: u8,
}

impl RecordHeader {
    /// Pack into the on-disk byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        let mut byte = (self.children & 0b11) | (self.parent_face.index() << 2);
        if self.compressed_coord {
            byte |= FLAG_COMPRESSED_COORD;
        }
        if self.compressed_color {
            byte |= FLAG_COMPRESSED_COLOR;
        }
        byte | ((self.blue_high & 0b11) << 6)
    }

    /// Unpack an on-disk byte. Returns `None` for face value 3.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        let Some(parent_face) = Face::from_index((byte >> 2) & 0b11) else {
            return None;
        };
        Some(Self {
            children: byte & 0b11,
            parent_face,
            compressed_coord: byte & FLAG_COMPRESSED_COORD != 0,
            compressed_color: byte & FLAG_COMPRESSED_COLOR != 0,
            blue_high: byte >> 6,
        })
    }
}

/// Bias each channel delta into its unsigned field.
///
/// Out-of-range deltas wrap at 16 bits; only in-range values are ever
/// stored in the packed word, but the blue high bits are written either way.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn bias(delta: [i32; 3]) -> [u16; 3] {
    [
        (delta[0] + COLOR_BIAS) as u16,
        (delta[1] + COLOR_BIAS) as u16,
        (delta[2] + COLOR_BIAS) as u16,
    ]
}

/// Pack biased deltas into the color word and the header's blue bits.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub const fn pack_color_delta(delta: [i32; 3]) -> (u16, u8) {
    let [r, g, b] = bias(delta);
    let word = (r & 0x3F) | ((g & 0x3F) << 6) | ((b & 0x0F) << 12);
    (word, ((b >> 4) & 0b11) as u8)
}

/// Inverse of [`pack_color_delta`].
#[must_use]
pub fn unpack_color_delta(word: u16, blue_high: u8) -> [i32; 3] {
    let r = i32::from(word & 0x3F);
    let g = i32::from((word >> 6) & 0x3F);
    let b = i32::from(word >> 12) | (i32::from(blue_high & 0b11) << 4);
    [r - COLOR_BIAS, g - COLOR_BIAS, b - COLOR_BIAS]
}

fn to_u16(point: Point, triangle: usize) -> Result<[u16; 2], MeshError> {
    match (u16::try_from(point.x), u16::try_from(point.y)) {
        (Ok(x), Ok(y)) => Ok([x, y]),
        _ => Err(MeshError::CoordinateOutOfRange { triangle, point }),
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_point(out: &mut Vec<u8>, [x, y]: [u16; 2]) {
    put_u16(out, x);
    put_u16(out, y);
}

/// Serialize a colored triangle set into `.tri` bytes.
///
/// Each triangle's vertices are canonicalized (Y then X) and the walk
/// starts at the first triangle. Colors are quantized to 8 bits before
/// deltas are taken, so compressed and absolute records decode to the
/// same channel values.
///
/// # Errors
///
/// - [`EncodeError::DimensionsTooLarge`] if either dimension exceeds 65535.
/// - [`EncodeError::Mesh`] if the set is empty, contains duplicate
///   triangles, is not edge-connected, has a vertex outside `0..=65535`,
///   or has a triangle with more children than its count field holds.
///
/// # Examples
///
/// ```
/// use tessel_mesh::{Color, ColoredTriangle, Dimensions, Point, Triangle};
/// use tessel_export::encode_tri;
///
/// let red = ColoredTriangle::new(
///     Triangle::new(Point::new(0, 0), Point::new(10, 0), Point::new(0, 10)),
///     Color::new(1.0, 0.0, 0.0),
/// );
/// let bytes = encode_tri(Dimensions::new(20, 20), &[red]).unwrap();
/// assert_eq!(bytes.len(), 4 + 1 + 12 + 3);
/// ```
pub fn encode_tri(
    dimensions: Dimensions,
    triangles: &[ColoredTriangle],
) -> Result<Vec<u8>, EncodeError> {
    let (Ok(width), Ok(height)) = (
        u16::try_from(dimensions.width),
        u16::try_from(dimensions.height),
    ) else {
        return Err(EncodeError::DimensionsTooLarge {
            width: dimensions.width,
            height: dimensions.height,
        });
    };

    let mut shapes: Vec<Triangle> = triangles.iter().map(|t| t.triangle).collect();
    canonicalize_all(&mut shapes);
    let colors: Vec<Rgb8> = triangles.iter().map(|t| t.color.quantize()).collect();
    let coords = shapes
        .iter()
        .enumerate()
        .map(|(i, t)| {
            Ok([
                to_u16(t.vertices[0], i)?,
                to_u16(t.vertices[1], i)?,
                to_u16(t.vertices[2], i)?,
            ])
        })
        .collect::<Result<Vec<_>, MeshError>>()?;

    let tree = SpanningTree::build(&shapes, 0)?;

    let mut out = Vec::with_capacity(4 + 16 + shapes.len() * 4);
    put_u16(&mut out, width);
    put_u16(&mut out, height);

    let root = tree.root().index;
    let adjacency = u8::try_from(tree.root_adjacency()).map_err(|_| MeshError::FanOutOverflow {
        triangle: root,
        count: tree.root_adjacency(),
        max: usize::from(u8::MAX),
    })?;
    out.push(adjacency);
    for vertex in coords[root] {
        put_point(&mut out, vertex);
    }
    out.extend_from_slice(&colors[root].0);

    for node in &tree.nodes()[1..] {
        let Some(link) = node.link else { continue };
        let children = u8::try_from(node.children)
            .ok()
            .filter(|&c| usize::from(c) <= MAX_CHILDREN)
            .ok_or(MeshError::FanOutOverflow {
                triangle: node.index,
                count: node.children,
                max: MAX_CHILDREN,
            })?;

        let reference = shapes[link.parent].vertices[usize::from(link.parent_face.index())];
        let slot = link.child_face.opposite_slot();
        let revealed = shapes[node.index].vertices[slot];
        let (dx, dy) = revealed.delta_from(reference);
        let compressed_coord = COORD_DELTA_RANGE.contains(&dx) && COORD_DELTA_RANGE.contains(&dy);

        let color = colors[node.index];
        let color_delta = color.delta_from(colors[link.parent]);
        let compressed_color = color_delta.iter().all(|d| COLOR_DELTA_RANGE.contains(d));
        let (word, blue_high) = pack_color_delta(color_delta);

        let header = RecordHeader {
            children,
            parent_face: link.parent_face,
            compressed_coord,
            compressed_color,
            blue_high,
        };
        out.push(header.to_byte());

        if compressed_coord {
            out.extend_from_slice(&[delta_byte(dx), delta_byte(dy)]);
        } else {
            put_point(&mut out, coords[node.index][slot]);
        }

        if compressed_color {
            put_u16(&mut out, word);
        } else {
            out.extend_from_slice(&color.0);
        }
    }

    Ok(out)
}

/// Two's-complement byte of a delta already checked to fit `i8`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn delta_byte(delta: i32) -> u8 {
    delta as i8 as u8
}

/// Encode and write a mesh to `writer`.
///
/// The whole file is encoded in memory first, so a mesh error never
/// leaves partial output behind. I/O errors are returned verbatim.
///
/// # Errors
///
/// Any [`EncodeError`] from [`encode_tri`], or [`EncodeError::Io`].
pub fn write_tri<W: Write>(
    writer: &mut W,
    dimensions: Dimensions,
    triangles: &[ColoredTriangle],
) -> Result<(), EncodeError> {
    let bytes = encode_tri(dimensions, triangles)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// A triangle read back from a `.tri` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedTriangle {
    /// Canonicalized vertices.
    pub triangle: Triangle,
    /// Quantized color.
    pub color: Rgb8,
}

/// The contents of a `.tri` stream, in breadth-first order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMesh {
    pub dimensions: Dimensions,
    pub triangles: Vec<DecodedTriangle>,
}

impl DecodedMesh {
    /// Convert to renderer-style colored triangles.
    #[must_use]
    pub fn colored_triangles(&self) -> Vec<ColoredTriangle> {
        self.triangles
            .iter()
            .map(|t| ColoredTriangle::new(t.triangle, t.color.to_color()))
            .collect()
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.offset + N;
        let chunk = self
            .bytes
            .get(self.offset..end)
            .and_then(|s| <[u8; N]>::try_from(s).ok())
            .ok_or(DecodeError::UnexpectedEof {
                offset: self.bytes.len(),
            })?;
        self.offset = end;
        Ok(chunk)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        let [b] = self.take::<1>()?;
        Ok(b)
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take::<2>()?))
    }

    fn point(&mut self) -> Result<Point, DecodeError> {
        let x = self.u16()?;
        let y = self.u16()?;
        Ok(Point::new(i32::from(x), i32::from(y)))
    }

    fn rgb(&mut self) -> Result<Rgb8, DecodeError> {
        Ok(Rgb8(self.take::<3>()?))
    }
}

/// Parse `.tri` bytes back into triangles.
///
/// Each non-root triangle is rebuilt from its parent's shared edge plus
/// the revealed vertex and then canonicalized, which reproduces the slot
/// order the encoder used.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first malformed record.
pub fn decode_tri(bytes: &[u8]) -> Result<DecodedMesh, DecodeError> {
    let mut reader = Reader::new(bytes);
    let width = reader.u16()?;
    let height = reader.u16()?;
    let root_children = reader.u8()?;
    let root = Triangle::new(reader.point()?, reader.point()?, reader.point()?);
    let root_color = reader.rgb()?;

    let mut triangles = vec![DecodedTriangle {
        triangle: root,
        color: root_color,
    }];
    let mut children = vec![usize::from(root_children)];

    let mut parent = 0;
    while parent < triangles.len() {
        for _ in 0..children[parent] {
            let offset = reader.offset;
            let byte = reader.u8()?;
            let header = RecordHeader::from_byte(byte).ok_or(DecodeError::InvalidFace {
                offset,
                value: (byte >> 2) & 0b11,
            })?;
            let base = triangles[parent];
            let [s0, s1] = header.parent_face.slots();

            let revealed = if header.compressed_coord {
                let [dx, dy] = reader.take::<2>()?;
                let reference = base.triangle.vertices[usize::from(header.parent_face.index())];
                let x = reference.x + i32::from(dx.cast_signed());
                let y = reference.y + i32::from(dy.cast_signed());
                if u16::try_from(x).is_err() || u16::try_from(y).is_err() {
                    return Err(DecodeError::CoordinateOutOfRange { offset });
                }
                Point::new(x, y)
            } else {
                reader.point()?
            };

            let color = if header.compressed_color {
                let delta = unpack_color_delta(reader.u16()?, header.blue_high);
                apply_color_delta(base.color, delta)
                    .ok_or(DecodeError::ColorOutOfRange { offset })?
            } else {
                reader.rgb()?
            };

            let triangle = Triangle::new(
                base.triangle.vertices[s0],
                base.triangle.vertices[s1],
                revealed,
            )
            .canonicalized();
            triangles.push(DecodedTriangle { triangle, color });
            children.push(usize::from(header.children));
        }
        parent += 1;
    }

    if reader.offset != bytes.len() {
        return Err(DecodeError::TrailingBytes {
            offset: reader.offset,
        });
    }

    Ok(DecodedMesh {
        dimensions: Dimensions::new(u32::from(width), u32::from(height)),
        triangles,
    })
}

fn apply_color_delta(base: Rgb8, delta: [i32; 3]) -> Option<Rgb8> {
    let mut out = [0u8; 3];
    for ((slot, channel), d) in out.iter_mut().zip(base.0).zip(delta) {
        *slot = u8::try_from(i32::from(channel) + d).ok()?;
    }
    Some(Rgb8(out))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use tessel_mesh::Color;

    use super::*;

    fn tri(a: (i32, i32), b: (i32, i32), c: (i32, i32)) -> Triangle {
        Triangle::new(
            Point::new(a.0, a.1),
            Point::new(b.0, b.1),
            Point::new(c.0, c.1),
        )
    }

    fn rgb(r: u8, g: u8, b: u8) -> Color {
        Rgb8([r, g, b]).to_color()
    }

    fn colored(t: Triangle, color: Color) -> ColoredTriangle {
        ColoredTriangle::new(t, color)
    }

    /// Root at the origin plus one child revealing `(x, y)` across the
    /// root's edge (0,0)-(10,0). The two overlap; the codec never looks
    /// at geometry beyond shared vertices.
    fn pair(x: i32, y: i32, root: Color, child: Color) -> Vec<ColoredTriangle> {
        vec![
            colored(tri((0, 0), (10, 0), (0, 10)), root),
            colored(tri((0, 0), (10, 0), (x, y)), child),
        ]
    }

    // --- Header / root record ---

    #[test]
    fn dimensions_are_little_endian_u16() {
        let mesh = [colored(tri((0, 0), (1, 0), (0, 1)), rgb(0, 0, 0))];
        let bytes = encode_tri(Dimensions::new(0x1234, 0xFFFF), &mesh).unwrap();
        assert_eq!(&bytes[..4], &[0x34, 0x12, 0xFF, 0xFF]);
        let decoded = decode_tri(&bytes).unwrap();
        assert_eq!(decoded.dimensions, Dimensions::new(0x1234, 0xFFFF));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let mesh = [colored(tri((0, 0), (1, 0), (0, 1)), rgb(0, 0, 0))];
        let err = encode_tri(Dimensions::new(65_536, 10), &mesh).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::DimensionsTooLarge {
                width: 65_536,
                height: 10
            }
        ));
    }

    #[test]
    fn single_red_triangle_exact_bytes() {
        let mesh = [colored(
            tri((0, 10), (10, 0), (0, 0)),
            Color::new(1.0, 0.0, 0.0),
        )];
        let bytes = encode_tri(Dimensions::new(20, 20), &mesh).unwrap();
        assert_eq!(
            bytes,
            vec![
                20, 0, 20, 0, // width, height
                0, // adjacency count
                0, 0, 0, 0, // (0, 0)
                10, 0, 0, 0, // (10, 0)
                0, 0, 10, 0, // (0, 10)
                255, 0, 0, // red
            ],
        );
    }

    // --- Child records ---

    #[test]
    fn small_deltas_use_compressed_paths() {
        let mesh = pair(5, 10, rgb(100, 50, 25), rgb(101, 50, 25));
        let bytes = encode_tri(Dimensions::new(20, 20), &mesh).unwrap();
        assert_eq!(bytes[4], 1, "root has one neighbour");
        let record = &bytes[20..];
        // children 0, parent face 0, both flags, blue high bits (32 >> 4) & 3 = 2.
        assert_eq!(record[0], 0b1011_0000);
        assert_eq!(&record[1..3], &[5, 10]);
        // 33 | 32 << 6 | (32 & 15) << 12 = 0x0821
        assert_eq!(&record[3..], &[0x21, 0x08]);

        let decoded = decode_tri(&bytes).unwrap();
        assert_eq!(decoded.triangles[1].color, Rgb8([101, 50, 25]));
        assert_eq!(
            decoded.triangles[1].triangle,
            tri((0, 0), (10, 0), (5, 10)),
        );
    }

    #[test]
    fn compressed_color_matches_absolute_quantization() {
        let child = Color::new(0.3971, 0.2, 0.1);
        let mesh = pair(5, 10, Color::new(0.3932, 0.2, 0.1), child);
        let bytes = encode_tri(Dimensions::new(20, 20), &mesh).unwrap();
        let header = RecordHeader::from_byte(bytes[20]).unwrap();
        assert!(header.compressed_color);
        let decoded = decode_tri(&bytes).unwrap();
        assert_eq!(decoded.triangles[1].color, child.quantize());
    }

    #[test]
    fn coordinate_compression_boundaries() {
        let cases = [
            (127, 10, true),
            (128, 10, false),
            (5, 127, true),
            (5, 128, false),
        ];
        for (x, y, expected) in cases {
            let mesh = pair(x, y, rgb(0, 0, 0), rgb(0, 0, 0));
            let bytes = encode_tri(Dimensions::new(300, 300), &mesh).unwrap();
            let header = RecordHeader::from_byte(bytes[20]).unwrap();
            assert_eq!(header.compressed_coord, expected, "({x}, {y})");
            let decoded = decode_tri(&bytes).unwrap();
            assert!(decoded.triangles[1].triangle.vertices.contains(&Point::new(x, y)));
        }
    }

    #[test]
    fn negative_coordinate_deltas() {
        // Reference is the parent's slot 0 = (200, 200); revealed vertex
        // sits up and left of it.
        let mesh = vec![
            colored(tri((200, 200), (210, 200), (200, 210)), rgb(9, 9, 9)),
            colored(tri((200, 200), (210, 200), (72, 150)), rgb(9, 9, 9)),
        ];
        let bytes = encode_tri(Dimensions::new(300, 300), &mesh).unwrap();
        let header = RecordHeader::from_byte(bytes[20]).unwrap();
        assert!(header.compressed_coord);
        assert_eq!(&bytes[21..23], &[(-128i8).cast_unsigned(), (-50i8).cast_unsigned()]);

        let mesh = vec![
            colored(tri((200, 200), (210, 200), (200, 210)), rgb(9, 9, 9)),
            colored(tri((200, 200), (210, 200), (71, 150)), rgb(9, 9, 9)),
        ];
        let bytes = encode_tri(Dimensions::new(300, 300), &mesh).unwrap();
        assert!(!RecordHeader::from_byte(bytes[20]).unwrap().compressed_coord);
        assert_eq!(&bytes[21..25], &[71, 0, 150, 0]);
    }

    #[test]
    fn color_compression_boundaries() {
        let cases = [(31, true), (32, false), (-32, true), (-33, false)];
        for (delta, expected) in cases {
            let child = u8::try_from(100 + delta).unwrap();
            for channel in 0..3 {
                let mut c = [100u8; 3];
                c[channel] = child;
                let mesh = pair(5, 10, rgb(100, 100, 100), rgb(c[0], c[1], c[2]));
                let bytes = encode_tri(Dimensions::new(20, 20), &mesh).unwrap();
                let header = RecordHeader::from_byte(bytes[20]).unwrap();
                assert_eq!(
                    header.compressed_color, expected,
                    "channel {channel} delta {delta}",
                );
                let decoded = decode_tri(&bytes).unwrap();
                assert_eq!(decoded.triangles[1].color, Rgb8(c));
            }
        }
    }

    #[test]
    fn blue_uses_full_six_bits() {
        // The packed word only has four bits left for blue; the other
        // two live in the header byte, so blue covers -32..=31 like red
        // and green.
        for delta in [-32, -17, -16, -1, 0, 15, 16, 31] {
            let (word, blue_high) = pack_color_delta([0, 0, delta]);
            assert_eq!(unpack_color_delta(word, blue_high), [0, 0, delta]);
        }
        let (_, high) = pack_color_delta([0, 0, 31]);
        assert_eq!(high, 3);
        let (_, high) = pack_color_delta([0, 0, -32]);
        assert_eq!(high, 0);
    }

    #[test]
    fn absolute_color_still_carries_blue_high_bits() {
        // Blue delta -100: (-68 as u16) >> 4 & 3 == 3.
        let mesh = pair(5, 10, rgb(0, 0, 150), rgb(0, 0, 50));
        let bytes = encode_tri(Dimensions::new(20, 20), &mesh).unwrap();
        assert_eq!(bytes[20], 0b1101_0000);
        assert_eq!(&bytes[23..], &[0, 0, 50]);

        // Blue delta +200: 232 >> 4 & 3 == 2.
        let mesh = pair(5, 10, rgb(0, 0, 0), rgb(0, 0, 200));
        let bytes = encode_tri(Dimensions::new(20, 20), &mesh).unwrap();
        assert_eq!(bytes[20] >> 6, 2);
    }

    #[test]
    fn record_header_round_trips() {
        let header = RecordHeader {
            children: 2,
            parent_face: Face::Edge02,
            compressed_coord: true,
            compressed_color: false,
            blue_high: 1,
        };
        assert_eq!(header.to_byte(), 0b0101_1010);
        assert_eq!(RecordHeader::from_byte(header.to_byte()), Some(header));
        assert_eq!(RecordHeader::from_byte(0b0000_1100), None);
    }

    // --- Mesh-level errors ---

    #[test]
    fn empty_mesh_is_rejected() {
        let err = encode_tri(Dimensions::new(1, 1), &[]).unwrap_err();
        assert!(matches!(err, EncodeError::Mesh(MeshError::Empty)));
    }

    #[test]
    fn disconnected_mesh_is_rejected() {
        let mesh = [
            colored(tri((0, 0), (10, 0), (0, 10)), rgb(0, 0, 0)),
            colored(tri((50, 50), (60, 50), (50, 60)), rgb(0, 0, 0)),
        ];
        let err = encode_tri(Dimensions::new(100, 100), &mesh).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Mesh(MeshError::Disconnected {
                reached: 1,
                total: 2
            })
        ));
    }

    #[test]
    fn negative_coordinates_are_rejected() {
        let mesh = [colored(tri((-1, 0), (10, 0), (0, 10)), rgb(0, 0, 0))];
        let err = encode_tri(Dimensions::new(20, 20), &mesh).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Mesh(MeshError::CoordinateOutOfRange { triangle: 0, .. })
        ));
    }

    #[test]
    fn fan_out_beyond_two_bits_is_rejected() {
        // Triangle 1 has four triangles hanging off its two free edges,
        // which only a non-manifold set can produce.
        let mesh: Vec<ColoredTriangle> = [
            tri((0, 20), (10, 20), (5, 10)),
            tri((0, 20), (10, 20), (5, 30)),
            tri((0, 20), (5, 30), (1, 25)),
            tri((0, 20), (5, 30), (2, 27)),
            tri((10, 20), (5, 30), (9, 25)),
            tri((10, 20), (5, 30), (8, 27)),
        ]
        .into_iter()
        .map(|t| colored(t, rgb(0, 0, 0)))
        .collect();
        let err = encode_tri(Dimensions::new(40, 40), &mesh).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Mesh(MeshError::FanOutOverflow {
                triangle: 1,
                count: 4,
                max: MAX_CHILDREN
            })
        ));
    }

    // --- Decoder ---

    #[test]
    fn truncated_stream_is_rejected() {
        let mesh = pair(5, 10, rgb(100, 50, 25), rgb(101, 50, 25));
        let bytes = encode_tri(Dimensions::new(20, 20), &mesh).unwrap();
        for cut in [0, 3, 10, 19, 20, 22] {
            assert!(
                matches!(
                    decode_tri(&bytes[..cut]),
                    Err(DecodeError::UnexpectedEof { .. })
                ),
                "cut at {cut}",
            );
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mesh = [colored(tri((0, 0), (1, 0), (0, 1)), rgb(1, 2, 3))];
        let mut bytes = encode_tri(Dimensions::new(2, 2), &mesh).unwrap();
        bytes.push(0);
        assert_eq!(
            decode_tri(&bytes),
            Err(DecodeError::TrailingBytes { offset: 20 }),
        );
    }

    #[test]
    fn invalid_face_is_rejected() {
        let mesh = pair(5, 10, rgb(100, 50, 25), rgb(101, 50, 25));
        let mut bytes = encode_tri(Dimensions::new(20, 20), &mesh).unwrap();
        bytes[20] |= 0b1100;
        assert_eq!(
            decode_tri(&bytes),
            Err(DecodeError::InvalidFace {
                offset: 20,
                value: 3
            }),
        );
    }

    #[test]
    fn write_tri_matches_encode_tri() {
        let mesh = pair(5, 10, rgb(100, 50, 25), rgb(200, 50, 25));
        let mut sink = Vec::new();
        write_tri(&mut sink, Dimensions::new(20, 20), &mesh).unwrap();
        assert_eq!(sink, encode_tri(Dimensions::new(20, 20), &mesh).unwrap());
    }

    #[test]
    fn write_tri_propagates_io_errors() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mesh = pair(5, 10, rgb(1, 1, 1), rgb(1, 1, 1));
        let err = write_tri(&mut Broken, Dimensions::new(20, 20), &mesh).unwrap_err();
        assert!(matches!(err, EncodeError::Io(ref e) if e.to_string() == "disk full"));
    }
}
