use super::*;

/// Parses markup into a fresh document. `script` and `style` bodies stay
/// inert text; `textarea` text and `select` values are initialised from the
/// markup.
pub(crate) fn parse_html(html: &str) -> Result<Dom> {
    let mut tree = TreeBuilder::new();
    let mut cursor = Cursor::new(html);

    while !cursor.is_done() {
        if cursor.eat("<!--") {
            if !cursor.skip_past("-->") {
                return Err(Error::HtmlParse("unclosed HTML comment".into()));
            }
        } else if cursor.eat("</") {
            let tag = cursor.end_tag()?;
            tree.close(&tag);
        } else if cursor.eat("<!") {
            cursor.skip_declaration()?;
        } else if cursor.at_start_tag() {
            let tag = cursor.start_tag()?;
            let name = tag.name.clone();
            let raw = is_raw_text_tag(&name) && !tag.self_closing;
            let node = tree.insert(tag);
            if raw {
                let body = cursor.raw_text(&name)?;
                let text = if name == "textarea" || name == "title" {
                    decode_character_references(body)
                } else {
                    body.to_string()
                };
                tree.append_text(node, text);
                cursor.eat("</");
                cursor.end_tag()?;
            }
        } else {
            let text = decode_character_references(cursor.text());
            let parent = tree.current();
            tree.append_text(parent, text);
        }
    }

    let mut dom = tree.dom;
    dom.initialize_form_control_values()?;
    Ok(dom)
}

struct StartTag {
    name: String,
    attrs: BTreeMap<String, String>,
    self_closing: bool,
}

/// Stack of open elements over the document being built.
struct TreeBuilder {
    dom: Dom,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            dom: Dom::new(),
            open: Vec::new(),
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(self.dom.root)
    }

    fn current_is(&self, tag: &str) -> bool {
        self.open
            .last()
            .is_some_and(|node| self.dom.tag_name(*node) == Some(tag))
    }

    fn insert(&mut self, tag: StartTag) -> NodeId {
        // `option` and `optgroup` end tags are optional.
        if matches!(tag.name.as_str(), "option" | "optgroup") && self.current_is("option") {
            self.open.pop();
        }
        if tag.name == "optgroup" && self.current_is("optgroup") {
            self.open.pop();
        }

        let parent = self.current();
        let keeps_open =
            !tag.self_closing && !is_void_tag(&tag.name) && !is_raw_text_tag(&tag.name);
        let node = self.dom.create_element(parent, tag.name, tag.attrs);
        if keeps_open {
            self.open.push(node);
        }
        node
    }

    /// Closes the innermost open element named `tag` and everything above
    /// it. A stray end tag is ignored.
    fn close(&mut self, tag: &str) {
        if let Some(index) = self
            .open
            .iter()
            .rposition(|node| self.dom.tag_name(*node) == Some(tag))
        {
            self.open.truncate(index);
        }
    }

    fn append_text(&mut self, parent: NodeId, text: String) {
        if !text.is_empty() {
            self.dom.create_text(parent, text);
        }
    }
}

/// Byte cursor over the source. It only ever stops on ASCII bytes or at the
/// end, so every slice it hands out falls on a char boundary.
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn is_done(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn skip_past(&mut self, needle: &str) -> bool {
        match self.rest().find(needle) {
            Some(at) => {
                self.pos += at + needle.len();
                true
            }
            None => false,
        }
    }

    fn skip_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.peek(0).is_some_and(&pred) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        self.skip_while(pred);
        &self.src[start..self.pos]
    }

    fn skip_ws(&mut self) {
        self.skip_while(|b| b.is_ascii_whitespace());
    }

    fn at_start_tag(&self) -> bool {
        self.peek(0) == Some(b'<') && self.peek(1).is_some_and(|b| b.is_ascii_alphabetic())
    }

    /// `<!DOCTYPE ...>` and friends; quoted sections may contain `>`.
    fn skip_declaration(&mut self) -> Result<()> {
        let mut quote = None;
        while let Some(b) = self.peek(0) {
            self.pos += 1;
            match quote {
                Some(open) if b == open => quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => quote = Some(b),
                None if b == b'>' => return Ok(()),
                None => {}
            }
        }
        Err(Error::HtmlParse("unclosed declaration".into()))
    }

    /// Reads the rest of an end tag after `</`.
    fn end_tag(&mut self) -> Result<String> {
        self.skip_ws();
        let name = self.take_while(is_name_byte).to_ascii_lowercase();
        if !self.skip_past(">") {
            return Err(Error::HtmlParse("unclosed end tag".into()));
        }
        Ok(name)
    }

    fn start_tag(&mut self) -> Result<StartTag> {
        self.pos += 1;
        let name = self.take_while(is_name_byte).to_ascii_lowercase();
        let mut attrs = BTreeMap::new();

        loop {
            self.skip_ws();
            if self.eat(">") {
                return Ok(StartTag {
                    name,
                    attrs,
                    self_closing: false,
                });
            }
            if self.eat("/>") {
                return Ok(StartTag {
                    name,
                    attrs,
                    self_closing: true,
                });
            }
            if self.is_done() {
                return Err(Error::HtmlParse(format!("unclosed <{name}> start tag")));
            }

            let key = self.take_while(is_attr_name_byte).to_ascii_lowercase();
            if key.is_empty() {
                // Stray quote or slash between attributes.
                self.pos += 1;
                self.skip_while(|b| !(b.is_ascii_whitespace() || b == b'>' || b == b'/'));
                continue;
            }

            self.skip_ws();
            let value = if self.eat("=") {
                self.skip_ws();
                self.attr_value()?
            } else {
                String::new()
            };
            attrs.entry(key).or_insert(value);
        }
    }

    fn attr_value(&mut self) -> Result<String> {
        let raw = match self.peek(0) {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let value = self.take_while(|b| b != quote);
                if self.peek(0) != Some(quote) {
                    return Err(Error::HtmlParse("unclosed quoted attribute value".into()));
                }
                self.pos += 1;
                value
            }
            Some(_) => self.take_while(|b| !(b.is_ascii_whitespace() || b == b'>')),
            None => return Err(Error::HtmlParse("missing attribute value".into())),
        };
        Ok(decode_character_references(raw))
    }

    /// Body of a raw-text element, up to (not including) its end tag.
    fn raw_text(&mut self, tag: &str) -> Result<&'a str> {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let end = rest
            .match_indices("</")
            .map(|(at, _)| at)
            .find(|at| {
                let name = at + 2;
                bytes
                    .get(name..name + tag.len())
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(tag.as_bytes()))
                    && bytes
                        .get(name + tag.len())
                        .is_none_or(|next| !is_name_byte(*next))
            })
            .ok_or_else(|| Error::HtmlParse(format!("unclosed <{tag}>")))?;
        self.pos += end;
        Ok(&rest[..end])
    }

    /// Character data up to the next `<`. The first byte is always taken so a
    /// `<` that opens no tag ends up in the text.
    fn text(&mut self) -> &'a str {
        let start = self.pos;
        self.pos += 1;
        self.skip_while(|b| b != b'<');
        &self.src[start..self.pos]
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn is_attr_name_byte(b: u8) -> bool {
    is_name_byte(b) || b == b':'
}

fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "textarea" | "title")
}

pub(crate) fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "source"
            | "wbr"
    )
}

fn decode_character_references(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }

    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp + 1..];
        let decoded = rest
            .find(';')
            .and_then(|semi| Some((character_reference(&rest[..semi])?, semi + 1)));
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => out.push('&'),
        }
    }
    out.push_str(rest);
    out
}

fn character_reference(entity: &str) -> Option<char> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let codepoint = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(codepoint);
    }
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        "hellip" => Some('…'),
        "mdash" => Some('—'),
        "copy" => Some('©'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_form_controls() -> Result<()> {
        let dom = parse_html(
            r#"
            <!DOCTYPE html>
            <form id="f">
              <!-- comment -->
              <input type="checkbox" id="agree" checked>
              <textarea id="bio">a &amp; b</textarea>
              <select id="s"><option>One<option value="2" selected>Two</select>
            </form>
            "#,
        )?;
        let agree = dom.by_id("agree").ok_or(Error::SelectorNotFound("#agree".into()))?;
        assert!(dom.checked(agree)?);
        assert_eq!(dom.attr(agree, "checked").as_deref(), Some(""));
        let bio = dom.by_id("bio").ok_or(Error::SelectorNotFound("#bio".into()))?;
        assert_eq!(dom.value(bio)?, "a & b");
        let select = dom.by_id("s").ok_or(Error::SelectorNotFound("#s".into()))?;
        assert_eq!(dom.select_options(select).len(), 2);
        assert_eq!(dom.value(select)?, "2");
        Ok(())
    }

    #[test]
    fn stray_end_tags_and_bare_angle_brackets_are_tolerated() -> Result<()> {
        let dom = parse_html("<form id='f'><p>1 < 2</span></p><input id='i'></form>")?;
        let form = dom.by_id("f").ok_or(Error::SelectorNotFound("#f".into()))?;
        let input = dom.by_id("i").ok_or(Error::SelectorNotFound("#i".into()))?;
        assert_eq!(dom.parent(input), Some(form));
        assert_eq!(dom.text_content(form), "1 < 2");
        Ok(())
    }

    #[test]
    fn optgroups_close_each_other_and_their_options() -> Result<()> {
        let dom = parse_html(
            "<select id='s'><optgroup label='a'><option>1\
             <optgroup label='b'><option>2</select><input id='after'>",
        )?;
        let select = dom.by_id("s").ok_or(Error::SelectorNotFound("#s".into()))?;
        let groups = dom.children(select).to_vec();
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|group| dom.tag_name(*group) == Some("optgroup")));
        let after = dom.by_id("after").ok_or(Error::SelectorNotFound("#after".into()))?;
        assert_eq!(dom.parent(after), Some(dom.root()));
        Ok(())
    }

    #[test]
    fn raw_text_end_tag_must_be_a_whole_name() -> Result<()> {
        let dom = parse_html("<script>if (a </scripts) {}</SCRIPT><input id='x'>")?;
        let script = dom
            .query_selector("script")?
            .ok_or(Error::SelectorNotFound("script".into()))?;
        assert_eq!(dom.text_content(script), "if (a </scripts) {}");
        assert!(dom.by_id("x").is_some());
        Ok(())
    }

    #[test]
    fn unclosed_constructs_are_errors() {
        for html in ["<div><!-- open", "<textarea>text", "<input id='a", "<!DOCTYPE"] {
            assert!(
                matches!(parse_html(html), Err(Error::HtmlParse(_))),
                "{html}"
            );
        }
    }

    #[test]
    fn decodes_numeric_and_named_references() {
        assert_eq!(
            decode_character_references("&#65;&#x42;&lt;&bogus;&amp"),
            "AB<&bogus;&amp"
        );
    }
}
