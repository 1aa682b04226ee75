use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{
    core::{Finish, Light, Scene, SceneObject, View},
    csg::{Csg, CsgChild, CsgOperation},
    error::SceneError,
    pigment::{Pigment, Texture},
    solid::{Quadric, Solid},
    Plane, Vec3,
};

/// Tokenizer and recursive descent reader of the scene format.
///
/// A scene is a whitespace separated stream of numbers and keywords, `#`
/// starts a comment that runs to the end of the line.
pub struct SceneParser<'a> {
    content: &'a str,
    chars: Vec<char>,
    buffer: Option<String>,
    position: FilePosition,
    token_start: FilePosition,
    base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePosition {
    line: u32,
    column: u32,
    index: u32,
}

impl FilePosition {
    fn new() -> Self {
        FilePosition {
            line: 0,
            column: 0,
            index: 0,
        }
    }

    fn on_new_line(&mut self) {
        self.line += 1;
        self.column = 0;
        self.index += 1;
    }

    fn advance(&mut self) {
        self.column += 1;
        self.index += 1;
    }
}

#[derive(Debug, Error)]
#[error("{message} at {}:{}", .position.line + 1, .position.column + 1)]
pub struct ParserError {
    position: FilePosition,
    pub message: String,
}

impl ParserError {
    fn new(message: &str, position: FilePosition) -> ParserError {
        ParserError {
            position,
            message: message.to_string(),
        }
    }

    /// Zero based line and column of the offending token.
    #[cfg(test)]
    fn location(&self) -> (u32, u32) {
        (self.position.line, self.position.column)
    }

    /// The offending line with a caret under the token.
    pub fn location_snippet(&self, content: &str) -> String {
        match content.lines().nth(self.position.line as usize) {
            Some(line) => {
                let spacing = " ".repeat(self.position.column as usize);
                format!("{}\n{}^", line, spacing)
            }
            None => String::new(),
        }
    }
}

type ParserResult<T> = Result<T, ParserError>;

impl SceneParser<'_> {
    pub fn new(content: &str) -> SceneParser<'_> {
        SceneParser {
            content,
            chars: content.chars().collect(),
            buffer: None,
            position: FilePosition::new(),
            token_start: FilePosition::new(),
            base_dir: None,
        }
    }

    /// Directory relative texture paths are resolved against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn get_current_char(&self) -> Option<char> {
        self.chars.get(self.position.index as usize).copied()
    }

    fn is_empty(&mut self) -> bool {
        self.buffer.is_none() && {
            self.eat_spaces();
            self.get_current_char().is_none()
        }
    }

    fn advance(&mut self) -> bool {
        if let Some(current_char) = self.get_current_char() {
            if current_char == '\n' {
                self.position.on_new_line();
            } else {
                self.position.advance();
            }
            return true;
        }
        false
    }

    fn advance_until(&mut self, f: impl Fn(char) -> bool) {
        while let Some(current_char) = self.get_current_char() {
            if f(current_char) {
                break;
            }
            self.advance();
        }
    }

    fn eat_spaces(&mut self) {
        // consume all the empty lines, spaces and comments before the next token
        while let Some(current_char) = self.get_current_char() {
            if current_char == '#' {
                // the end-of-line is consumed at the end of the loop
                self.advance_until(|c| c == '\n');
            } else if !current_char.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    /// Next token, empty at the end of the input.
    fn pop(&mut self) -> String {
        // check if we already peeked without eating the next token
        if let Some(token) = self.buffer.take() {
            return token;
        }

        self.eat_spaces();
        self.token_start = self.position;
        let mut result = String::new();
        while let Some(current_char) = self.get_current_char() {
            if current_char.is_whitespace() || current_char == '#' {
                break;
            }
            result.push(current_char);
            self.advance();
        }
        result
    }

    fn peek(&mut self) -> &str {
        // peek always look ahead and save the result to the buffer
        if self.buffer.is_none() {
            let token = self.pop();
            self.buffer = Some(token);
        }
        self.buffer.as_deref().unwrap_or_default()
    }

    fn error<T>(&self, message: &str) -> ParserResult<T> {
        Err(ParserError::new(message, self.token_start))
    }

    fn pop_expecting(&mut self, what: &str) -> ParserResult<String> {
        let token = self.pop();
        if token.is_empty() {
            let message = format!("unexpected end of file, expected {}", what);
            return self.error(&message);
        }
        Ok(token)
    }

    fn parse_float(&mut self) -> ParserResult<f64> {
        let next_token = self.pop_expecting("a number")?;
        match next_token.parse::<f64>() {
            Ok(num) if num.is_finite() => Ok(num),
            _ => {
                let message = format!("cannot interpret '{}' as a number", next_token);
                self.error(&message)
            }
        }
    }

    fn parse_count(&mut self, what: &str) -> ParserResult<usize> {
        let next_token = self.pop_expecting(what)?;
        if let Ok(num) = next_token.parse::<usize>() {
            Ok(num)
        } else {
            let message = format!(
                "cannot interpret '{}' as {}, expected a non negative integer",
                next_token, what
            );
            self.error(&message)
        }
    }

    fn parse_floats<const N: usize>(&mut self) -> ParserResult<[f64; N]> {
        let mut values = [0.0; N];
        for value in values.iter_mut() {
            *value = self.parse_float()?;
        }
        Ok(values)
    }

    fn parse_vec3(&mut self) -> ParserResult<Vec3> {
        Ok(Vec3::from(self.parse_floats::<3>()?))
    }

    fn parse_view(&mut self) -> ParserResult<View> {
        let eye = self.parse_vec3()?;
        let look_at = self.parse_vec3()?;
        let up = self.parse_vec3()?;
        let fovy = self.parse_float()?;
        if fovy <= 0.0 || fovy >= 180.0 {
            return self.error("field of view must be between 0 and 180 degrees");
        }
        Ok(View {
            eye,
            look_at,
            up,
            fovy,
        })
    }

    fn parse_light(&mut self) -> ParserResult<Light> {
        let position = self.parse_vec3()?;
        let color = self.parse_vec3()?;
        let attenuation = self.parse_vec3()?;
        Ok(Light {
            position,
            color,
            attenuation,
        })
    }

    fn load_texture(&self, path: &str) -> Option<Texture> {
        let mut resolved = PathBuf::from(path);
        if let Some(dir) = &self.base_dir {
            let candidate = dir.join(path);
            if resolved.is_relative() && candidate.exists() {
                resolved = candidate;
            }
        }
        match Texture::load(&resolved) {
            Ok(texture) => {
                log::debug!("loaded texture {}", resolved.display());
                Some(texture)
            }
            Err(err) => {
                log::warn!("{}, falling back to a solid color", err);
                None
            }
        }
    }

    fn parse_pigment(&mut self) -> ParserResult<Pigment> {
        let kind = self.pop_expecting("a pigment kind")?;
        match kind.as_str() {
            "solid" => Ok(Pigment::Solid(self.parse_vec3()?)),
            "checker" => {
                let even = self.parse_vec3()?;
                let odd = self.parse_vec3()?;
                let scale = self.parse_float()?;
                if scale <= 0.0 {
                    return self.error("checker scale must be positive");
                }
                Ok(Pigment::Checker { even, odd, scale })
            }
            "texmap" => {
                let path = self.pop_expecting("a texture path")?;
                let s = self.parse_floats::<4>()?;
                let t = self.parse_floats::<4>()?;
                let texture = self.load_texture(&path);
                Ok(Pigment::TextureMap { texture, s, t })
            }
            _ => {
                let message = format!("unknown pigment '{}'", kind);
                self.error(&message)
            }
        }
    }

    fn parse_finish(&mut self) -> ParserResult<Finish> {
        let [ambient, diffuse, specular, shininess, reflectivity, transmissivity, ior] =
            self.parse_floats::<7>()?;
        Ok(Finish {
            ambient,
            diffuse,
            specular,
            shininess,
            reflectivity,
            transmissivity,
            ior,
        })
    }

    fn parse_csg_operation(&mut self) -> ParserResult<CsgOperation> {
        let token = self.pop_expecting("a csg operation")?;
        match token.as_str() {
            "+" => Ok(CsgOperation::Union),
            "-" => Ok(CsgOperation::Difference),
            _ => {
                let message = format!("unknown csg operation '{}', expected '+' or '-'", token);
                self.error(&message)
            }
        }
    }

    fn parse_solid(&mut self) -> ParserResult<Solid> {
        let kind = self.pop_expecting("an object kind")?;
        match kind.as_str() {
            "sphere" => {
                let center = self.parse_vec3()?;
                let radius = self.parse_float()?;
                Ok(Solid::Sphere { center, radius })
            }
            "polyhedron" => {
                let count = self.parse_count("a face count")?;
                let mut faces = Vec::with_capacity(count);
                for _ in 0..count {
                    let [a, b, c, d] = self.parse_floats::<4>()?;
                    faces.push(Plane::new(a, b, c, d));
                }
                Ok(Solid::Polyhedron { faces })
            }
            "quadric" => Ok(Solid::Quadric(Quadric::from(self.parse_floats::<10>()?))),
            "csg" => {
                let count = self.parse_count("a child count")?;
                let mut csg = Csg::new();
                for _ in 0..count {
                    let operation = self.parse_csg_operation()?;
                    // the material of the children is the one of the whole composite
                    let child = self.parse_object()?;
                    csg.children.push(CsgChild {
                        operation,
                        solid: child.solid,
                    });
                }
                Ok(Solid::Csg(csg))
            }
            _ => {
                let message = format!("unknown object '{}'", kind);
                self.error(&message)
            }
        }
    }

    fn parse_object(&mut self) -> ParserResult<SceneObject> {
        let pigment = self.parse_count("a pigment index")?;
        let finish = self.parse_count("a finish index")?;
        let solid = self.parse_solid()?;
        Ok(SceneObject {
            solid,
            pigment,
            finish,
        })
    }

    /// Parses the whole file. The result is not validated, see [`Scene::validate`].
    pub fn parse_scene(&mut self) -> ParserResult<Scene> {
        let view = self.parse_view()?;

        let count = self.parse_count("a light count")?;
        let lights = (0..count)
            .map(|_| self.parse_light())
            .collect::<ParserResult<Vec<_>>>()?;

        let count = self.parse_count("a pigment count")?;
        let pigments = (0..count)
            .map(|_| self.parse_pigment())
            .collect::<ParserResult<Vec<_>>>()?;

        let count = self.parse_count("a finish count")?;
        let finishes = (0..count)
            .map(|_| self.parse_finish())
            .collect::<ParserResult<Vec<_>>>()?;

        let count = self.parse_count("an object count")?;
        let mut objects = Vec::with_capacity(count);
        for index in 0..count {
            let object = self.parse_object()?;
            log::debug!("object {}: {:?}", index, object.solid);
            objects.push(object);
        }

        if !self.is_empty() {
            let token = self.peek().to_string();
            log::warn!(
                "ignoring trailing content starting with '{}' at line {}",
                token,
                self.token_start.line + 1
            );
        }

        Ok(Scene {
            view,
            lights,
            pigments,
            finishes,
            objects,
        })
    }

    pub fn content(&self) -> &str {
        self.content
    }
}

/// Parses and validates a scene held in memory. Relative texture paths are
/// resolved against `base_dir` when given.
pub fn parse_scene_str(content: &str, base_dir: Option<&Path>) -> Result<Scene, SceneError> {
    let mut parser = SceneParser::new(content);
    if let Some(dir) = base_dir {
        parser = parser.with_base_dir(dir);
    }
    let scene = parser.parse_scene().map_err(|err| {
        log::error!("{}\n{}", err, err.location_snippet(parser.content()));
        err
    })?;
    scene.validate()?;
    Ok(scene)
}

/// Reads, parses and validates a scene file.
pub fn load_scene(path: &Path) -> Result<Scene, SceneError> {
    let content = fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let scene = parse_scene_str(&content, path.parent())?;
    log::info!(
        "loaded {}: {} lights, {} pigments, {} finishes, {} objects",
        path.display(),
        scene.lights.len(),
        scene.pigments.len(),
        scene.finishes.len(),
        scene.objects.len()
    );
    Ok(scene)
}
