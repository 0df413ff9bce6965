//! Argument scanner for directive values.
//!
//! Accepts the loose literal syntax used in comment markers: numbers, bools,
//! `"quoted"` / `` `raw` `` / bare strings, `{a,b}` lists, `{k: v}` maps and
//! `a;b;c` lists.
use serde_json::{Map, Number, Value};

pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) { self.bump(); }
    }

    pub fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.rest().is_empty()
    }

    pub fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, c: char) -> Result<(), String> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(format!("expected `{c}` at offset {}", self.pos))
        }
    }

    /// Identifier used as a named-argument key.
    pub fn ident(&mut self) -> Result<&'a str, String> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') { self.bump(); }
        if start == self.pos {
            return Err(format!("expected identifier at offset {start}"));
        }
        Ok(&self.src[start..self.pos])
    }

    /// A string: quoted, back-quoted, or bare up to one of `stops`.
    pub fn string(&mut self, stops: &[char]) -> Result<String, String> {
        self.skip_ws();
        match self.peek() {
            Some('"') => self.quoted(),
            Some('`') => self.raw(),
            _ => Ok(self.bare(stops).to_string()),
        }
    }

    /// Everything that is left, unquoted if it is a single string literal.
    pub fn remainder_string(&mut self) -> Result<String, String> {
        self.skip_ws();
        if matches!(self.peek(), Some('"' | '`')) {
            let s = self.string(&[])?;
            if !self.at_end() {
                return Err(format!("trailing input after string: `{}`", self.rest()));
            }
            return Ok(s);
        }
        let s = self.rest().trim_end().to_string();
        self.pos = self.src.len();
        Ok(s)
    }

    pub fn value(&mut self, stops: &[char]) -> Result<Value, String> {
        self.skip_ws();
        match self.peek() {
            None => Err("expected a value".to_string()),
            Some('"') => self.quoted().map(Value::String),
            Some('`') => self.raw().map(Value::String),
            Some('{') => self.braced(),
            Some(_) => Ok(scalar(self.bare(stops))),
        }
    }

    /// Top-level list: `{a,b}` or `a;b;c`.
    pub fn list(&mut self) -> Result<Vec<Value>, String> {
        self.skip_ws();
        if self.peek() == Some('{') {
            return match self.braced()? {
                Value::Array(xs) => Ok(xs),
                other => Err(format!("expected a list, got {other}")),
            };
        }
        let mut out = Vec::new();
        loop {
            out.push(self.value(&[';'])?);
            if !self.eat(';') {
                break;
            }
        }
        Ok(out)
    }

    fn bare(&mut self, stops: &[char]) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            self.bump();
        }
        self.src[start..self.pos].trim()
    }

    fn quoted(&mut self) -> Result<String, String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err("unterminated string".to_string()),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c @ ('"' | '\\' | '\'')) => out.push(c),
                    Some(c) => { out.push('\\'); out.push(c); }
                    None => return Err("unterminated escape".to_string()),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn raw(&mut self) -> Result<String, String> {
        self.bump();
        let start = self.pos;
        while let Some(c) = self.bump() {
            if c == '`' {
                return Ok(self.src[start..self.pos - 1].to_string());
            }
        }
        Err("unterminated raw string".to_string())
    }

    fn braced(&mut self) -> Result<Value, String> {
        self.expect('{')?;
        if self.eat('}') {
            return Ok(Value::Array(Vec::new()));
        }
        if self.looks_like_map() {
            let mut map = Map::new();
            loop {
                let key = self.string(&[':'])?;
                self.expect(':')?;
                let value = self.value(&[',', '}'])?;
                map.insert(key, value);
                if !self.eat(',') {
                    break;
                }
            }
            self.expect('}')?;
            Ok(Value::Object(map))
        } else {
            let mut items = Vec::new();
            loop {
                items.push(self.value(&[',', '}'])?);
                if !self.eat(',') {
                    break;
                }
            }
            self.expect('}')?;
            Ok(Value::Array(items))
        }
    }

    // `{key: ...` vs `{a, b}`: look for a `:` before the first `,` or `}`
    // outside of quotes.
    fn looks_like_map(&self) -> bool {
        let mut quote = None;
        for c in self.rest().chars() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '`') => quote = Some(c),
                (None, ':') => return true,
                (None, ',' | '}' | '{') => return false,
                _ => {}
            }
        }
        false
    }
}

fn scalar(token: &str) -> Value {
    match token {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = token.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = token.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars() {
        assert_eq!(Cursor::new("42").value(&[]).unwrap(), json!(42));
        assert_eq!(Cursor::new("-1.5").value(&[]).unwrap(), json!(-1.5));
        assert_eq!(Cursor::new("true").value(&[]).unwrap(), json!(true));
        assert_eq!(Cursor::new("Cluster").value(&[]).unwrap(), json!("Cluster"));
        assert_eq!(Cursor::new(r#""a \"b\"""#).value(&[]).unwrap(), json!("a \"b\""));
    }

    #[test]
    fn lists_and_maps() {
        assert_eq!(Cursor::new("{1,2}").value(&[]).unwrap(), json!([1, 2]));
        assert_eq!(
            Cursor::new(r#"{policy: "delete", count: 3}"#).value(&[]).unwrap(),
            json!({ "policy": "delete", "count": 3 })
        );
        assert_eq!(Cursor::new("a;b;c").list().unwrap(), json!(["a", "b", "c"]).as_array().unwrap().clone());
    }

    #[test]
    fn raw_strings_keep_backslashes() {
        assert_eq!(Cursor::new(r"`^\d+$`").remainder_string().unwrap(), r"^\d+$");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(Cursor::new("\"abc").value(&[]).is_err());
    }
}
