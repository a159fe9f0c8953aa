//! Streaming JSON container scanner
//!
//! Pulls the elements of named `nodes` / `edges` containers out of a JSON
//! document without materializing the document. The scanner is a
//! byte-level state machine with three states (`Normal`, `InString`,
//! `InEscape`) and a depth counter; depth only changes in `Normal` state,
//! so strings containing structural characters are skipped correctly.
//!
//! Both container shapes are supported:
//!
//! - arrays of objects: `"nodes": [ {...}, {...} ]`
//! - objects of objects: `"nodes": { "id1": {...}, "id2": {...} }`
//!   (each member's key is reported alongside its element)
//!
//! Element bytes are handed back whole for `serde_json::from_slice`; the
//! memory high-water mark is one element, not the document.

use std::io::BufRead;

use biograph_core::Result;

/// One extracted element.
#[derive(Debug)]
pub struct ScanEvent {
    /// Index into the target-name list passed at construction
    pub target: usize,
    /// Member key, for object-shaped containers
    pub key: Option<String>,
    /// The element's raw bytes (a complete JSON object)
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Normal,
    InString,
    InEscape,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ContainerShape {
    Array,
    Object,
}

struct TargetCtx {
    target: usize,
    shape: ContainerShape,
    /// Depth of the container itself; elements open at `depth + 1`
    depth: u32,
}

struct Capture {
    target: usize,
    key: Option<String>,
    bytes: Vec<u8>,
    /// Unclosed braces within the capture
    nesting: u32,
}

/// Scans a JSON byte stream for the elements of named containers.
pub struct JsonContainerScanner<R: BufRead> {
    reader: R,
    targets: Vec<String>,
    state: State,
    depth: u32,
    /// Content of the string literal currently being read
    string_buf: Vec<u8>,
    /// The most recently completed string literal
    recent_string: Option<String>,
    /// A `:` was seen; the next value belongs to `recent_string`
    value_expected: bool,
    active: Option<TargetCtx>,
    capture: Option<Capture>,
    /// Key awaiting its value inside an object-shaped container
    member_key: Option<String>,
    done: bool,
}

impl<R: BufRead> JsonContainerScanner<R> {
    /// Scan `reader` for containers named by `targets`.
    pub fn new(reader: R, targets: &[&str]) -> Self {
        Self {
            reader,
            targets: targets.iter().map(|t| t.to_string()).collect(),
            state: State::Normal,
            depth: 0,
            string_buf: Vec::new(),
            recent_string: None,
            value_expected: false,
            active: None,
            capture: None,
            member_key: None,
            done: false,
        }
    }

    /// Feed one byte while a capture is in flight. Returns a finished
    /// event when the element closes.
    fn capture_byte(&mut self, b: u8) -> Option<ScanEvent> {
        let cap = self.capture.as_mut().expect("capture in flight");
        cap.bytes.push(b);
        match self.state {
            State::InString => match b {
                b'\\' => self.state = State::InEscape,
                b'"' => self.state = State::Normal,
                _ => {}
            },
            State::InEscape => self.state = State::InString,
            State::Normal => match b {
                b'"' => self.state = State::InString,
                b'{' | b'[' => cap.nesting += 1,
                b'}' | b']' => {
                    cap.nesting -= 1;
                    if cap.nesting == 0 {
                        let cap = self.capture.take().expect("capture in flight");
                        return Some(ScanEvent {
                            target: cap.target,
                            key: cap.key,
                            bytes: cap.bytes,
                        });
                    }
                }
                _ => {}
            },
        }
        None
    }

    /// Feed one byte in scanning mode.
    fn scan_byte(&mut self, b: u8) {
        match self.state {
            State::InString => match b {
                b'\\' => self.state = State::InEscape,
                b'"' => {
                    self.state = State::Normal;
                    self.recent_string =
                        Some(String::from_utf8_lossy(&self.string_buf).into_owned());
                }
                _ => self.string_buf.push(b),
            },
            State::InEscape => {
                self.string_buf.push(b);
                self.state = State::InString;
            }
            State::Normal => match b {
                b'"' => {
                    // A string value consumes the pending key.
                    if self.value_expected {
                        self.value_expected = false;
                        self.recent_string = None;
                    }
                    self.state = State::InString;
                    self.string_buf.clear();
                }
                b':' => self.value_expected = true,
                b'{' | b'[' => {
                    self.depth += 1;
                    let shape = if b == b'{' {
                        ContainerShape::Object
                    } else {
                        ContainerShape::Array
                    };
                    if self.value_expected && self.active.is_none() {
                        if let Some(key) = self.recent_string.take() {
                            if let Some(idx) = self.targets.iter().position(|t| *t == key) {
                                self.active = Some(TargetCtx {
                                    target: idx,
                                    shape,
                                    depth: self.depth,
                                });
                            }
                        }
                    }
                    self.value_expected = false;
                }
                b'}' | b']' => {
                    if let Some(ctx) = &self.active {
                        if self.depth == ctx.depth {
                            self.active = None;
                            self.member_key = None;
                        }
                    }
                    self.depth = self.depth.saturating_sub(1);
                }
                b if b.is_ascii_whitespace() || b == b',' => {}
                _ => {
                    // Scalar value (number, true, false, null) consumes the key.
                    self.value_expected = false;
                    self.recent_string = None;
                }
            },
        }
    }

    /// Should a capture begin for this byte? Decided before the byte is
    /// fed to `scan_byte`.
    fn starts_element(&mut self, b: u8) -> bool {
        if self.state != State::Normal || b != b'{' {
            return false;
        }
        let ctx = match &self.active {
            Some(ctx) => ctx,
            None => return false,
        };
        match ctx.shape {
            // Array elements open one level below the container.
            ContainerShape::Array => self.depth == ctx.depth,
            // Object members need a key and a pending value marker.
            ContainerShape::Object => {
                if self.depth == ctx.depth && self.value_expected {
                    self.member_key = self.recent_string.take();
                    self.value_expected = false;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Pull the next element from the stream.
    pub fn next_event(&mut self) -> Result<Option<ScanEvent>> {
        if self.done {
            return Ok(None);
        }
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                self.done = true;
                return Ok(None);
            }
            let len = buf.len();
            let chunk = buf.to_vec();
            let mut consumed = 0;
            for (i, &b) in chunk.iter().enumerate() {
                consumed = i + 1;
                if self.capture.is_some() {
                    if let Some(event) = self.capture_byte(b) {
                        self.reader.consume(consumed);
                        return Ok(Some(event));
                    }
                } else if self.starts_element(b) {
                    let ctx = self.active.as_ref().expect("active target");
                    self.capture = Some(Capture {
                        target: ctx.target,
                        key: self.member_key.take(),
                        bytes: vec![b],
                        nesting: 1,
                    });
                } else {
                    self.scan_byte(b);
                }
            }
            debug_assert_eq!(consumed, len);
            self.reader.consume(len);
        }
    }
}

impl<R: BufRead> Iterator for JsonContainerScanner<R> {
    type Item = Result<ScanEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}
