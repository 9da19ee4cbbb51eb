use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use strata_common::{Result, StrataError};

pub mod value;

/// Named children of a compound, kept in insertion order so that a decoded
/// tree re-encodes byte for byte.
pub type Compound = IndexMap<String, Tag>;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    End,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    ByteArray,
    String,
    List,
    Compound,
    IntArray,
}

impl TagKind {
    pub const ALL: [TagKind; 12] = [
        TagKind::End,
        TagKind::Byte,
        TagKind::Short,
        TagKind::Int,
        TagKind::Long,
        TagKind::Float,
        TagKind::Double,
        TagKind::ByteArray,
        TagKind::String,
        TagKind::List,
        TagKind::Compound,
        TagKind::IntArray,
    ];

    pub fn id(self) -> u8 {
        match self {
            TagKind::End => 0,
            TagKind::Byte => 1,
            TagKind::Short => 2,
            TagKind::Int => 3,
            TagKind::Long => 4,
            TagKind::Float => 5,
            TagKind::Double => 6,
            TagKind::ByteArray => 7,
            TagKind::String => 8,
            TagKind::List => 9,
            TagKind::Compound => 10,
            TagKind::IntArray => 11,
        }
    }

    pub fn from_id(id: u8) -> Result<Self> {
        TagKind::ALL
            .get(id as usize)
            .copied()
            .ok_or_else(|| StrataError::format(format!("Invalid tag type: {}", id)))
    }

    /// Name used by kind schemas, e.g. `TAG_Int_Array`.
    pub fn name(self) -> &'static str {
        match self {
            TagKind::End => "TAG_End",
            TagKind::Byte => "TAG_Byte",
            TagKind::Short => "TAG_Short",
            TagKind::Int => "TAG_Int",
            TagKind::Long => "TAG_Long",
            TagKind::Float => "TAG_Float",
            TagKind::Double => "TAG_Double",
            TagKind::ByteArray => "TAG_Byte_Array",
            TagKind::String => "TAG_String",
            TagKind::List => "TAG_List",
            TagKind::Compound => "TAG_Compound",
            TagKind::IntArray => "TAG_Int_Array",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        TagKind::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

/// Homogeneous list payload. The element kind is recorded even when the list
/// is empty, and every element is guaranteed to be of that kind.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    kind: TagKind,
    items: Vec<Tag>,
}

impl List {
    pub fn new(kind: TagKind, items: Vec<Tag>) -> Result<Self> {
        if let Some(bad) = items.iter().find(|item| item.kind() != kind) {
            return Err(StrataError::format(format!(
                "List of {} cannot hold a {}",
                kind.name(),
                bad.kind().name()
            )));
        }
        if kind == TagKind::End && !items.is_empty() {
            return Err(StrataError::format("List of TAG_End must be empty"));
        }
        Ok(List { kind, items })
    }

    pub fn empty(kind: TagKind) -> Self {
        List {
            kind,
            items: Vec::new(),
        }
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn push(&mut self, tag: Tag) -> Result<()> {
        if tag.kind() != self.kind || self.kind == TagKind::End {
            return Err(StrataError::format(format!(
                "List of {} cannot hold a {}",
                self.kind.name(),
                tag.kind().name()
            )));
        }
        self.items.push(tag);
        Ok(())
    }

    pub fn items(&self) -> &[Tag] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<Tag> {
        self.items
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(List),
    Compound(Compound),
    IntArray(Vec<i32>),
}

fn read_length<R: Read>(reader: &mut R) -> Result<usize> {
    let length = reader
        .read_i32::<BigEndian>()
        .map_err(StrataError::from_decode)?;
    if length < 0 {
        return Err(StrataError::format(format!("Negative length: {}", length)));
    }
    Ok(length as usize)
}

fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let length = reader
        .read_u16::<BigEndian>()
        .map_err(StrataError::from_decode)?;
    let mut bytes = vec![0u8; length as usize];
    reader
        .read_exact(&mut bytes)
        .map_err(StrataError::from_decode)?;
    String::from_utf8(bytes).map_err(|e| StrataError::format(e.to_string()))
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let length = u16::try_from(value.len()).map_err(|_| {
        StrataError::format(format!("String of {} bytes is too long", value.len()))
    })?;
    writer.write_u16::<BigEndian>(length)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

impl Tag {
    pub fn kind(&self) -> TagKind {
        match self {
            Tag::End => TagKind::End,
            Tag::Byte(_) => TagKind::Byte,
            Tag::Short(_) => TagKind::Short,
            Tag::Int(_) => TagKind::Int,
            Tag::Long(_) => TagKind::Long,
            Tag::Float(_) => TagKind::Float,
            Tag::Double(_) => TagKind::Double,
            Tag::ByteArray(_) => TagKind::ByteArray,
            Tag::String(_) => TagKind::String,
            Tag::List(_) => TagKind::List,
            Tag::Compound(_) => TagKind::Compound,
            Tag::IntArray(_) => TagKind::IntArray,
        }
    }

    /// Reads one full tag (kind byte, name, payload). A bare End byte yields
    /// an unnamed `Tag::End`.
    pub fn read<R: Read>(reader: &mut R) -> Result<(String, Tag)> {
        let type_id = reader.read_u8().map_err(StrataError::from_decode)?;
        let kind = TagKind::from_id(type_id)?;
        if kind == TagKind::End {
            return Ok((String::new(), Tag::End));
        }

        let name = read_string(reader)?;
        let tag = Tag::read_payload(reader, kind)?;
        Ok((name, tag))
    }

    pub fn read_payload<R: Read>(reader: &mut R, kind: TagKind) -> Result<Tag> {
        let scalar = match kind {
            TagKind::End => Ok(Tag::End),
            TagKind::Byte => reader.read_i8().map(Tag::Byte),
            TagKind::Short => reader.read_i16::<BigEndian>().map(Tag::Short),
            TagKind::Int => reader.read_i32::<BigEndian>().map(Tag::Int),
            TagKind::Long => reader.read_i64::<BigEndian>().map(Tag::Long),
            TagKind::Float => reader.read_f32::<BigEndian>().map(Tag::Float),
            TagKind::Double => reader.read_f64::<BigEndian>().map(Tag::Double),
            TagKind::ByteArray => {
                let length = read_length(reader)?;
                let mut bytes = Vec::new();
                reader
                    .by_ref()
                    .take(length as u64)
                    .read_to_end(&mut bytes)
                    .map_err(StrataError::from_decode)?;
                if bytes.len() < length {
                    return Err(StrataError::Truncated);
                }
                return Ok(Tag::ByteArray(bytes.into_iter().map(|b| b as i8).collect()));
            }
            TagKind::String => return read_string(reader).map(Tag::String),
            TagKind::List => {
                let list_kind = TagKind::from_id(reader.read_u8().map_err(StrataError::from_decode)?)?;
                let length = read_length(reader)?;
                if list_kind == TagKind::End && length > 0 {
                    return Err(StrataError::format("List of TAG_End must be empty"));
                }
                let mut items = Vec::with_capacity(length.min(4096));
                for _ in 0..length {
                    items.push(Tag::read_payload(reader, list_kind)?);
                }
                return Ok(Tag::List(List {
                    kind: list_kind,
                    items,
                }));
            }
            TagKind::Compound => {
                let mut compound = Compound::new();
                loop {
                    let (name, tag) = Tag::read(reader)?;
                    if let Tag::End = tag {
                        break;
                    }
                    compound.insert(name, tag);
                }
                return Ok(Tag::Compound(compound));
            }
            TagKind::IntArray => {
                let length = read_length(reader)?;
                let mut ints = Vec::with_capacity(length.min(4096));
                for _ in 0..length {
                    ints.push(
                        reader
                            .read_i32::<BigEndian>()
                            .map_err(StrataError::from_decode)?,
                    );
                }
                return Ok(Tag::IntArray(ints));
            }
        };
        scalar.map_err(StrataError::from_decode)
    }

    pub fn write<W: Write>(&self, writer: &mut W, name: &str) -> Result<()> {
        writer.write_u8(self.kind().id())?;

        if !matches!(self, Tag::End) {
            write_string(writer, name)?;
        }

        self.write_payload(writer)
    }

    pub fn write_payload<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Tag::End => {}
            Tag::Byte(v) => writer.write_i8(*v)?,
            Tag::Short(v) => writer.write_i16::<BigEndian>(*v)?,
            Tag::Int(v) => writer.write_i32::<BigEndian>(*v)?,
            Tag::Long(v) => writer.write_i64::<BigEndian>(*v)?,
            Tag::Float(v) => writer.write_f32::<BigEndian>(*v)?,
            Tag::Double(v) => writer.write_f64::<BigEndian>(*v)?,
            Tag::ByteArray(v) => {
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                let bytes: Vec<u8> = v.iter().map(|&b| b as u8).collect();
                writer.write_all(&bytes)?;
            }
            Tag::String(v) => write_string(writer, v)?,
            Tag::List(list) => {
                writer.write_u8(list.kind.id())?;
                writer.write_i32::<BigEndian>(list.items.len() as i32)?;
                for tag in &list.items {
                    if tag.kind() != list.kind {
                        return Err(StrataError::format(format!(
                            "List of {} cannot hold a {}",
                            list.kind.name(),
                            tag.kind().name()
                        )));
                    }
                    tag.write_payload(writer)?;
                }
            }
            Tag::Compound(v) => {
                for (name, tag) in v {
                    // a bare End byte would close the compound early
                    if matches!(tag, Tag::End) {
                        return Err(StrataError::format(format!(
                            "Compound entry {:?} cannot be a TAG_End",
                            name
                        )));
                    }
                    tag.write(writer, name)?;
                }
                Tag::End.write(writer, "")?;
            }
            Tag::IntArray(v) => {
                writer.write_i32::<BigEndian>(v.len() as i32)?;
                for &i in v {
                    writer.write_i32::<BigEndian>(i)?;
                }
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer, name)?;
        Ok(buffer)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<(String, Tag)> {
        Tag::read(&mut Cursor::new(bytes))
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_compound_mut(&mut self) -> Option<&mut Compound> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Tag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_byte_array(&self) -> Option<&[i8]> {
        match self {
            Tag::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Tag::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Tag::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Tag::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Tag::Short(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self {
            Tag::Byte(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Tag::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Tag::Float(n) => Some(*n),
            _ => None,
        }
    }
}

/// True if the stream starts with the gzip magic number. The cursor is left
/// where it was.
pub fn is_gzipped<S: Read + Seek>(stream: &mut S) -> Result<bool> {
    let pos = stream.stream_position()?;
    let mut magic = [0u8; 2];
    let res = match stream.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    };
    stream.seek(SeekFrom::Start(pos))?;
    res
}

// NbtFile represents a complete NBT document with compression support
#[derive(Debug, Clone, PartialEq)]
pub struct NbtFile {
    pub root: Tag,
    pub name: String,
}

impl NbtFile {
    pub fn new(name: String, root: Tag) -> Self {
        NbtFile { root, name }
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let (name, root) = Tag::read(reader)?;
        Ok(NbtFile { root, name })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.root.write(writer, &self.name)
    }

    pub fn read_gzip<R: Read>(reader: &mut R) -> Result<Self> {
        let mut decoder = GzDecoder::new(reader);
        Self::read(&mut decoder)
    }

    pub fn write_gzip<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        self.write(&mut encoder)?;
        encoder.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample_compound() -> Tag {
        let mut compound = Compound::new();
        compound.insert("a".to_string(), Tag::Int(5));
        compound.insert(
            "b".to_string(),
            Tag::List(
                List::new(
                    TagKind::Short,
                    vec![Tag::Short(1), Tag::Short(2), Tag::Short(3)],
                )
                .unwrap(),
            ),
        );
        Tag::Compound(compound)
    }

    #[test]
    fn test_tag_kind_ids() {
        for (id, kind) in TagKind::ALL.iter().enumerate() {
            assert_eq!(kind.id() as usize, id);
            assert_eq!(TagKind::from_id(id as u8).unwrap(), *kind);
            assert_eq!(TagKind::from_name(kind.name()), Some(*kind));
        }
        assert_matches!(TagKind::from_id(12), Err(StrataError::Format(_)));
        assert_eq!(Tag::IntArray(vec![]).kind(), TagKind::IntArray);
        assert_eq!(Tag::Compound(Compound::new()).kind(), TagKind::Compound);
    }

    #[test]
    fn test_tag_as_methods() {
        let compound = sample_compound();
        assert_eq!(
            compound.as_compound().unwrap().get("a"),
            Some(&Tag::Int(5))
        );
        assert!(Tag::Int(0).as_compound().is_none());
        assert_eq!(
            compound.as_compound().unwrap()["b"].as_list().unwrap().len(),
            3
        );

        assert_eq!(Tag::String("test".to_string()).as_string(), Some("test"));
        assert_eq!(Tag::Byte(42).as_i8(), Some(42));
        assert_eq!(Tag::Short(42).as_i16(), Some(42));
        assert_eq!(Tag::Int(42).as_i32(), Some(42));
        assert_eq!(Tag::Long(42).as_i64(), Some(42));
        assert_eq!(Tag::Float(42.0).as_f32(), Some(42.0));
        assert_eq!(Tag::Double(42.0).as_f64(), Some(42.0));
        assert_eq!(Tag::ByteArray(vec![1, -1]).as_byte_array(), Some(&[1i8, -1][..]));
        assert!(Tag::Int(1).as_int_array().is_none());
    }

    #[test]
    fn test_tag_read_write() {
        let test_cases = vec![
            (Tag::Byte(-42), "byte"),
            (Tag::Short(1234), "short"),
            (Tag::Int(-12345678), "int"),
            (Tag::Long(123456789012), "long"),
            (Tag::Float(3.25), "float"),
            (Tag::Double(3.14159), "double"),
            (Tag::ByteArray(vec![1, -2, 3]), "bytearray"),
            (Tag::String("Hello, World!".to_string()), "string"),
            (Tag::IntArray(vec![1, -2, 3]), "intarray"),
            (sample_compound(), "compound"),
        ];

        for (tag, name) in test_cases {
            let buffer = tag.to_bytes(name).unwrap();
            let (read_name, read_tag) = Tag::from_bytes(&buffer).unwrap();

            assert_eq!(read_name, name);
            assert_eq!(read_tag, tag);
        }
    }

    #[test]
    fn test_exact_layout() {
        let bytes = sample_compound().to_bytes("").unwrap();
        let expected: Vec<u8> = vec![
            10, 0, 0, // compound, empty name
            3, 0, 1, b'a', 0, 0, 0, 5, // int "a" = 5
            9, 0, 1, b'b', 2, 0, 0, 0, 3, 0, 1, 0, 2, 0, 3, // list "b" of 3 shorts
            0, // end
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_reencode_is_byte_identical() {
        let original = sample_compound().to_bytes("").unwrap();
        let (name, decoded) = Tag::from_bytes(&original).unwrap();
        assert_eq!(decoded.to_bytes(&name).unwrap(), original);
        assert_eq!(decoded.to_bytes(&name).unwrap(), original);
    }

    #[test]
    fn test_insertion_order_survives() {
        let mut compound = Compound::new();
        for key in ["zeta", "alpha", "mid", "beta"] {
            compound.insert(key.to_string(), Tag::Byte(1));
        }
        let bytes = Tag::Compound(compound).to_bytes("root").unwrap();
        let (_, decoded) = Tag::from_bytes(&bytes).unwrap();
        let keys: Vec<&str> = decoded
            .as_compound()
            .unwrap()
            .keys()
            .map(|k| k.as_str())
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid", "beta"]);
    }

    #[test]
    fn test_empty_list_keeps_kind() {
        let tag = Tag::List(List::empty(TagKind::Compound));
        let buffer = tag.to_bytes("empty").unwrap();

        let (name, read_tag) = Tag::from_bytes(&buffer).unwrap();
        assert_eq!(name, "empty");
        assert_eq!(read_tag.as_list().unwrap().kind(), TagKind::Compound);
        assert_eq!(read_tag, tag);
    }

    #[test]
    fn test_nested_lists() {
        let inner = List::new(TagKind::Int, vec![Tag::Int(1), Tag::Int(2)]).unwrap();
        let outer = List::new(
            TagKind::List,
            vec![Tag::List(inner.clone()), Tag::List(List::empty(TagKind::End))],
        )
        .unwrap();
        let tag = Tag::List(outer);
        let (_, read_tag) = Tag::from_bytes(&tag.to_bytes("nested").unwrap()).unwrap();
        assert_eq!(read_tag, tag);
    }

    #[test]
    fn test_heterogeneous_list_rejected() {
        assert_matches!(
            List::new(TagKind::Int, vec![Tag::Int(1), Tag::Short(2)]),
            Err(StrataError::Format(_))
        );
        let mut list = List::empty(TagKind::String);
        assert_matches!(list.push(Tag::Int(1)), Err(StrataError::Format(_)));
        assert!(list.push(Tag::String("ok".to_string())).is_ok());
        assert_matches!(
            List::new(TagKind::End, vec![Tag::End]),
            Err(StrataError::Format(_))
        );
    }

    #[test]
    fn test_end_inside_compound_rejected() {
        let mut compound = Compound::new();
        compound.insert("a".to_string(), Tag::End);
        compound.insert("b".to_string(), Tag::Int(1));
        assert_matches!(
            Tag::Compound(compound).to_bytes(""),
            Err(StrataError::Format(_))
        );
    }

    #[test]
    fn test_nbt_file() {
        let original = NbtFile::new("test".to_string(), sample_compound());

        let mut buffer = Vec::new();
        original.write(&mut buffer).unwrap();
        let read = NbtFile::read(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(read, original);

        let mut gzip_buffer = Vec::new();
        original.write_gzip(&mut gzip_buffer).unwrap();
        let mut gzip_cursor = Cursor::new(gzip_buffer);
        assert!(is_gzipped(&mut gzip_cursor).unwrap());
        assert_eq!(gzip_cursor.position(), 0);
        let gzip_read = NbtFile::read_gzip(&mut gzip_cursor).unwrap();
        assert_eq!(gzip_read, original);
    }

    #[test]
    fn test_is_gzipped_short_stream() {
        assert!(!is_gzipped(&mut Cursor::new(vec![0x1f])).unwrap());
        assert!(!is_gzipped(&mut Cursor::new(vec![10, 0, 0, 0])).unwrap());
    }

    #[test]
    fn test_invalid_tag_type() {
        let result = Tag::from_bytes(&[255, 0, 0]);
        assert_matches!(result, Err(StrataError::Format(_)));

        // unknown element kind inside a list
        let result = Tag::from_bytes(&[9, 0, 0, 42, 0, 0, 0, 1]);
        assert_matches!(result, Err(StrataError::Format(_)));
    }

    #[test]
    fn test_truncated_input() {
        let full = sample_compound().to_bytes("root").unwrap();
        for cut in 1..full.len() {
            assert_matches!(
                Tag::from_bytes(&full[..cut]),
                Err(StrataError::Truncated),
                "cut at {}",
                cut
            );
        }
        assert_matches!(Tag::from_bytes(&[]), Err(StrataError::Truncated));
        // byte array claiming more bytes than present
        assert_matches!(
            Tag::from_bytes(&[7, 0, 0, 0, 0, 0, 4, 1, 2]),
            Err(StrataError::Truncated)
        );
    }

    #[test]
    fn test_negative_length() {
        assert_matches!(
            Tag::from_bytes(&[11, 0, 0, 0xff, 0xff, 0xff, 0xff]),
            Err(StrataError::Format(_))
        );
    }

    #[test]
    fn test_invalid_utf8_name() {
        assert_matches!(
            Tag::from_bytes(&[1, 0, 1, 0xff, 7]),
            Err(StrataError::Format(_))
        );
    }
}
