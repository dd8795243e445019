//! Typed-value marshalling.
//!
//! Non-string attribute values survive encryption by being serialized to a
//! byte stream before ciphering. The format is not ours to choose: it is a
//! frozen, versioned wire contract (header `\x04\x08`) that must stay
//! byte-compatible with values persisted by earlier engine versions, so both
//! directions here are implemented against known-good legacy dump bytes
//! rather than any contemporary serde format.
//!
//! Supported types: nil, booleans, integers, UTF-8 strings, and calendar
//! dates. Dates travel as the user-marshalled `Date` shape
//! `[nth, jd, df, sf, of, sg]` with `jd` the Julian Day Number; strings carry
//! the UTF-8 instance-variable marker (`E` = true). Anything else in a stream
//! is rejected with [`VaultError::Serialization`].

use chrono::{Datelike, NaiveDate};

use crate::error::{Result, VaultError};

/// Marshal stream version header.
const VERSION: [u8; 2] = [4, 8];

/// Difference between a Julian Day Number and chrono's `num_days_from_ce`.
const JDN_EPOCH_OFFSET: i64 = 1_721_425;

/// Gregorian calendar reform JDN (Italy), as the float literal legacy dumps
/// carry in the `sg` slot.
const GREGORIAN_ITALY: &[u8] = b"2299161";

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Date(NaiveDate),
}

impl Value {
    /// Whether this value counts as "no value" for the empty-handling rule:
    /// empty plaintext never reaches the cipher.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Str(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Plain string form used by non-marshalling attributes.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Str(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_plain_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// Serialize a value to the legacy marshal stream.
///
/// Integers are limited to the 32-bit range of the packed-long encoding;
/// larger magnitudes would need the bignum form, which no persisted
/// attribute data has ever used.
pub fn dump(value: &Value) -> Result<Vec<u8>> {
    if let Value::Int(i) = value {
        if i32::try_from(*i).is_err() {
            return Err(VaultError::Serialization(format!(
                "integer {i} out of range for the legacy format"
            )));
        }
    }
    let mut out = Vec::with_capacity(32);
    out.extend_from_slice(&VERSION);
    write_value(&mut out, value);
    Ok(out)
}

/// Deserialize a legacy marshal stream back into a value.
pub fn load(bytes: &[u8]) -> Result<Value> {
    if bytes.len() < 3 || bytes[..2] != VERSION {
        return Err(VaultError::Serialization(
            "unsupported marshal stream version".to_string(),
        ));
    }
    let mut reader = Reader::new(&bytes[2..]);
    reader.read_value()
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Nil => out.push(b'0'),
        Value::Bool(true) => out.push(b'T'),
        Value::Bool(false) => out.push(b'F'),
        Value::Int(i) => {
            out.push(b'i');
            write_long(out, *i);
        }
        Value::Str(s) => {
            // I"<bytes> with the single ivar E=true (UTF-8), exactly as the
            // legacy dumps carry it.
            out.push(b'I');
            out.push(b'"');
            write_long(out, s.len() as i64);
            out.extend_from_slice(s.as_bytes());
            write_long(out, 1);
            write_symbol(out, b"E");
            out.push(b'T');
        }
        Value::Date(d) => {
            out.push(b'U');
            write_symbol(out, b"Date");
            out.push(b'[');
            write_long(out, 6);
            out.push(b'i');
            write_long(out, 0); // nth
            out.push(b'i');
            write_long(out, i64::from(d.num_days_from_ce()) + JDN_EPOCH_OFFSET);
            for _ in 0..3 {
                out.push(b'i');
                write_long(out, 0); // df, sf, of
            }
            out.push(b'f');
            write_long(out, GREGORIAN_ITALY.len() as i64);
            out.extend_from_slice(GREGORIAN_ITALY);
        }
    }
}

fn write_symbol(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b':');
    write_long(out, name.len() as i64);
    out.extend_from_slice(name);
}

/// Packed-long encoding: 0 is a bare zero byte, small magnitudes are offset
/// by 5, everything else is a signed byte count (1..=4) followed by
/// little-endian bytes. Callers guarantee the value fits in 32 bits.
fn write_long(out: &mut Vec<u8>, v: i64) {
    if v == 0 {
        out.push(0);
    } else if v > 0 && v < 123 {
        out.push((v + 5) as u8);
    } else if v < 0 && v > -124 {
        out.push(((v - 5) & 0xff) as u8);
    } else {
        let mut bytes = [0u8; 4];
        let mut x = v;
        let mut len = 0usize;
        let marker = loop {
            bytes[len] = (x & 0xff) as u8;
            x >>= 8;
            len += 1;
            if x == 0 {
                break len as u8;
            }
            if x == -1 {
                break (-(len as i8)) as u8;
            }
        };
        out.push(marker);
        out.extend_from_slice(&bytes[..len]);
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    symbols: Vec<Vec<u8>>,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            symbols: Vec::new(),
        }
    }

    fn read_value(&mut self) -> Result<Value> {
        match self.read_byte()? {
            b'0' => Ok(Value::Nil),
            b'T' => Ok(Value::Bool(true)),
            b'F' => Ok(Value::Bool(false)),
            b'i' => Ok(Value::Int(self.read_long()?)),
            b'"' => self.read_string(),
            b'I' => {
                // In this subset only strings carry instance variables.
                if self.read_byte()? != b'"' {
                    return Err(VaultError::Serialization(
                        "instance variables on a non-string object".to_string(),
                    ));
                }
                let value = self.read_string()?;
                self.skip_ivars()?;
                Ok(value)
            }
            b'U' => self.read_user_marshalled(),
            tag => Err(VaultError::Serialization(format!(
                "unsupported marshal tag 0x{tag:02x}"
            ))),
        }
    }

    fn read_string(&mut self) -> Result<Value> {
        let raw = self.read_byte_seq()?;
        let s = std::str::from_utf8(raw)
            .map_err(|_| VaultError::Serialization("string is not valid UTF-8".to_string()))?;
        Ok(Value::Str(s.to_string()))
    }

    /// Consume an instance-variable list (`E` / `encoding` markers); the
    /// values themselves are irrelevant here, strings are always UTF-8.
    fn skip_ivars(&mut self) -> Result<()> {
        let count = self.read_long()?;
        for _ in 0..count {
            self.read_symbol()?;
            match self.read_byte()? {
                b'T' | b'F' | b'0' => {}
                b'"' => {
                    self.read_byte_seq()?;
                }
                tag => {
                    return Err(VaultError::Serialization(format!(
                        "unsupported instance-variable value tag 0x{tag:02x}"
                    )))
                }
            }
        }
        Ok(())
    }

    fn read_user_marshalled(&mut self) -> Result<Value> {
        let class = self.read_symbol()?;
        if class != b"Date" {
            return Err(VaultError::Serialization(format!(
                "unsupported user-marshalled class {:?}",
                String::from_utf8_lossy(&class)
            )));
        }
        if self.read_byte()? != b'[' {
            return Err(VaultError::Serialization(
                "malformed date payload".to_string(),
            ));
        }
        let len = self.read_long()?;
        if len != 6 {
            return Err(VaultError::Serialization(format!(
                "unsupported date encoding with {len} fields"
            )));
        }

        let nth = self.read_number()?;
        let jd = self.read_number()?;
        let df = self.read_number()?;
        let sf = self.read_number()?;
        let of = self.read_number()?;
        let _sg = self.read_number()?; // calendar reform start, irrelevant here

        if nth != 0.0 || df != 0.0 || sf != 0.0 || of != 0.0 {
            return Err(VaultError::Serialization(
                "date with sub-day or offset components".to_string(),
            ));
        }

        let days_from_ce = jd as i64 - JDN_EPOCH_OFFSET;
        let days: i32 = days_from_ce
            .try_into()
            .map_err(|_| VaultError::Serialization("date out of range".to_string()))?;
        NaiveDate::from_num_days_from_ce_opt(days)
            .map(Value::Date)
            .ok_or_else(|| VaultError::Serialization("date out of range".to_string()))
    }

    /// Integer or float, wherever the date shape allows either.
    fn read_number(&mut self) -> Result<f64> {
        match self.read_byte()? {
            b'i' => Ok(self.read_long()? as f64),
            b'f' => {
                let raw = self.read_byte_seq()?;
                std::str::from_utf8(raw)
                    .ok()
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or_else(|| {
                        VaultError::Serialization("malformed float literal".to_string())
                    })
            }
            tag => Err(VaultError::Serialization(format!(
                "expected number, found tag 0x{tag:02x}"
            ))),
        }
    }

    fn read_symbol(&mut self) -> Result<Vec<u8>> {
        match self.read_byte()? {
            b':' => {
                let name = self.read_byte_seq()?.to_vec();
                self.symbols.push(name.clone());
                Ok(name)
            }
            b';' => {
                let index = self.read_long()?;
                usize::try_from(index)
                    .ok()
                    .and_then(|i| self.symbols.get(i))
                    .cloned()
                    .ok_or_else(|| {
                        VaultError::Serialization(format!("dangling symbol link {index}"))
                    })
            }
            tag => Err(VaultError::Serialization(format!(
                "expected symbol, found tag 0x{tag:02x}"
            ))),
        }
    }

    fn read_byte_seq(&mut self) -> Result<&'a [u8]> {
        let len = self.read_long()?;
        let len: usize = len
            .try_into()
            .map_err(|_| VaultError::Serialization("negative length".to_string()))?;
        if self.buf.len() - self.pos < len {
            return Err(VaultError::Serialization(
                "truncated marshal stream".to_string(),
            ));
        }
        let raw = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(raw)
    }

    fn read_long(&mut self) -> Result<i64> {
        let c = self.read_byte()? as i8;
        match c {
            0 => Ok(0),
            1..=4 => {
                let mut x: i64 = 0;
                for i in 0..c as usize {
                    x |= i64::from(self.read_byte()?) << (8 * i);
                }
                Ok(x)
            }
            -4..=-1 => {
                let mut x: i64 = -1;
                for i in 0..(-c) as usize {
                    x &= !(0xffi64 << (8 * i));
                    x |= i64::from(self.read_byte()?) << (8 * i);
                }
                Ok(x)
            }
            5..=127 => Ok(i64::from(c) - 5),
            _ => Ok(i64::from(c) + 5),
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        let b = self.buf.get(self.pos).copied().ok_or_else(|| {
            VaultError::Serialization("truncated marshal stream".to_string())
        })?;
        self.pos += 1;
        Ok(b)
    }
}
