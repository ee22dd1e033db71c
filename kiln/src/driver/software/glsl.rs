//! Just enough GLSL scanning for the software driver: compile diagnostics and uniform declarations.
//!
//! This is not a compiler. Sources are tokenized after comment removal and scanned for `uniform`
//! declarations; struct-typed uniforms are not understood and are skipped.

use gl::types::*;

/// A default-block uniform declaration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) struct DeclaredUniform {
  pub name: String,
  pub ty: GLenum,
  pub count: usize,
}

/// A uniform block declaration, sized with the std140 rules.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) struct DeclaredBlock {
  pub name: String,
  pub size: usize,
  pub members: usize,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(super) struct Declarations {
  pub uniforms: Vec<DeclaredUniform>,
  pub blocks: Vec<DeclaredBlock>,
}

/// Check a source the way a strict front-end would reject it; returns the info log on failure.
pub(super) fn check(source: &str) -> Result<(), String> {
  let stripped = strip_comments(source);

  if stripped.trim().is_empty() {
    return Err("0:0(0): error: empty shader source".to_owned());
  }

  for (line, text) in stripped.lines().enumerate() {
    let text = text.trim_start();

    if let Some(msg) = text.strip_prefix("#error") {
      return Err(format!("0:{}(1): error: {}", line + 1, msg.trim()));
    }
  }

  let mut depth = 0isize;
  for (line, text) in stripped.lines().enumerate() {
    for c in text.chars() {
      match c {
        '{' => depth += 1,
        '}' => depth -= 1,
        _ => (),
      }

      if depth < 0 {
        return Err(format!("0:{}(1): error: unexpected '}}'", line + 1));
      }
    }
  }

  if depth != 0 {
    return Err("0:0(0): error: unexpected end of file, unbalanced '{'".to_owned());
  }

  let tokens = tokenize(&stripped);
  let has_main = tokens
    .windows(3)
    .any(|w| w[0] == "void" && w[1] == "main" && w[2] == "(");

  if !has_main {
    return Err("0:0(0): error: entry point `void main()` not found".to_owned());
  }

  Ok(())
}

/// Uniforms and uniform blocks declared in a source, in declaration order.
pub(super) fn declarations(source: &str) -> Declarations {
  let tokens = tokenize(&strip_comments(source));
  let mut decls = Declarations::default();
  let mut i = 0;

  while i < tokens.len() {
    if tokens[i] != "uniform" {
      i += 1;
      continue;
    }

    i += 1;
    while i < tokens.len() && is_precision(&tokens[i]) {
      i += 1;
    }

    let Some(type_name) = tokens.get(i).cloned() else {
      break;
    };
    i += 1;

    if tokens.get(i).map(String::as_str) == Some("{") {
      let (block, next) = parse_block(type_name, &tokens, i + 1);
      decls.blocks.push(block);
      i = next;
      continue;
    }

    let (names, next) = parse_declarators(&tokens, i);
    i = next;

    if let Some((ty, _, _)) = glsl_type(&type_name) {
      decls.uniforms.extend(
        names
          .into_iter()
          .map(|(name, count)| DeclaredUniform { name, ty, count }),
      );
    }
  }

  decls
}

fn is_precision(token: &str) -> bool {
  matches!(token, "highp" | "mediump" | "lowp")
}

// `name[N] (= init)?, ...;` starting at `i`; returns the names with their array length and the
// index past the semicolon.
fn parse_declarators(tokens: &[String], mut i: usize) -> (Vec<(String, usize)>, usize) {
  let mut names = Vec::new();

  while i < tokens.len() {
    let name = tokens[i].clone();
    let mut count = 1;
    i += 1;

    if tokens.get(i).map(String::as_str) == Some("[") {
      count = tokens
        .get(i + 1)
        .and_then(|n| n.parse().ok())
        .unwrap_or(1);

      while i < tokens.len() && tokens[i] != "]" {
        i += 1;
      }
      i += 1;
    }

    if tokens.get(i).map(String::as_str) == Some("=") {
      let mut parens = 0isize;

      while i < tokens.len() {
        match tokens[i].as_str() {
          "(" => parens += 1,
          ")" => parens -= 1,
          "," | ";" if parens == 0 => break,
          _ => (),
        }
        i += 1;
      }
    }

    names.push((name, count));

    match tokens.get(i).map(String::as_str) {
      Some(",") => i += 1,
      _ => {
        i += 1;
        break;
      }
    }
  }

  (names, i)
}

// Block body starting right after `{`.
fn parse_block(name: String, tokens: &[String], mut i: usize) -> (DeclaredBlock, usize) {
  let mut offset = 0;
  let mut members = 0;

  while i < tokens.len() && tokens[i] != "}" {
    while i < tokens.len() && (is_precision(&tokens[i]) || tokens[i] == "layout") {
      if tokens[i] == "layout" {
        while i < tokens.len() && tokens[i] != ")" {
          i += 1;
        }
      }
      i += 1;
    }

    let type_name = tokens.get(i).cloned().unwrap_or_default();
    let (names, next) = parse_declarators(tokens, i + 1);
    i = next;

    let (_, size, align) = glsl_type(&type_name).unwrap_or((0, 16, 16));

    for (_, count) in names {
      members += 1;

      if count > 1 {
        let stride = round_up(size, 16);
        offset = round_up(offset, 16) + stride * count;
      } else {
        offset = round_up(offset, align) + size;
      }
    }
  }

  // skip `}`, an optional instance name and the closing `;`
  while i < tokens.len() && tokens[i] != ";" {
    i += 1;
  }

  let block = DeclaredBlock {
    name,
    size: round_up(offset, 16),
    members,
  };

  (block, i + 1)
}

fn round_up(value: usize, align: usize) -> usize {
  (value + align - 1) / align * align
}

// (type enum, std140 size, std140 base alignment)
fn glsl_type(name: &str) -> Option<(GLenum, usize, usize)> {
  let ty = match name {
    "float" => (gl::FLOAT, 4, 4),
    "vec2" => (gl::FLOAT_VEC2, 8, 8),
    "vec3" => (gl::FLOAT_VEC3, 12, 16),
    "vec4" => (gl::FLOAT_VEC4, 16, 16),
    "int" => (gl::INT, 4, 4),
    "ivec2" => (gl::INT_VEC2, 8, 8),
    "ivec3" => (gl::INT_VEC3, 12, 16),
    "ivec4" => (gl::INT_VEC4, 16, 16),
    "uint" => (gl::UNSIGNED_INT, 4, 4),
    "uvec2" => (gl::UNSIGNED_INT_VEC2, 8, 8),
    "uvec3" => (gl::UNSIGNED_INT_VEC3, 12, 16),
    "uvec4" => (gl::UNSIGNED_INT_VEC4, 16, 16),
    "bool" => (gl::BOOL, 4, 4),
    "bvec2" => (gl::BOOL_VEC2, 8, 8),
    "bvec3" => (gl::BOOL_VEC3, 12, 16),
    "bvec4" => (gl::BOOL_VEC4, 16, 16),
    "mat2" => (gl::FLOAT_MAT2, 32, 16),
    "mat3" => (gl::FLOAT_MAT3, 48, 16),
    "mat4" => (gl::FLOAT_MAT4, 64, 16),
    "sampler1D" => (gl::SAMPLER_1D, 4, 4),
    "sampler2D" => (gl::SAMPLER_2D, 4, 4),
    "sampler3D" => (gl::SAMPLER_3D, 4, 4),
    "samplerCube" => (gl::SAMPLER_CUBE, 4, 4),
    "sampler2DArray" => (gl::SAMPLER_2D_ARRAY, 4, 4),
    "sampler2DShadow" => (gl::SAMPLER_2D_SHADOW, 4, 4),
    "isampler2D" => (gl::INT_SAMPLER_2D, 4, 4),
    "usampler2D" => (gl::UNSIGNED_INT_SAMPLER_2D, 4, 4),
    _ => return None,
  };

  Some(ty)
}

fn strip_comments(source: &str) -> String {
  let mut out = String::with_capacity(source.len());
  let mut chars = source.chars().peekable();

  while let Some(c) = chars.next() {
    match (c, chars.peek()) {
      ('/', Some('/')) => {
        for c in chars.by_ref() {
          if c == '\n' {
            out.push('\n');
            break;
          }
        }
      }

      ('/', Some('*')) => {
        chars.next();
        let mut prev = ' ';

        for c in chars.by_ref() {
          // keep line numbers stable
          if c == '\n' {
            out.push('\n');
          }

          if prev == '*' && c == '/' {
            break;
          }

          prev = c;
        }

        out.push(' ');
      }

      _ => out.push(c),
    }
  }

  out
}

fn tokenize(source: &str) -> Vec<String> {
  let mut tokens = Vec::new();
  let mut word = String::new();

  for line in source.lines() {
    // preprocessor lines carry no declarations
    if line.trim_start().starts_with('#') {
      continue;
    }

    for c in line.chars() {
      if c.is_alphanumeric() || c == '_' {
        word.push(c);
        continue;
      }

      if !word.is_empty() {
        tokens.push(std::mem::take(&mut word));
      }

      if !c.is_whitespace() {
        tokens.push(c.to_string());
      }
    }

    if !word.is_empty() {
      tokens.push(std::mem::take(&mut word));
    }
  }

  tokens
}
