//! Compiling a [`Bind`] description into a flat list of field decoders.

use std::any::{type_name, TypeId};
use std::collections::BTreeMap;
use std::fmt;

use super::{Bind, BindError, CtxUnmarshal, Mode, Scope, TextDecode};
use crate::ctx::Ctx;

/// Key/value pairs a decoder reads from, per scope.
///
/// [`Ctx`] is the source for request binding. Pairs are returned in arrival
/// order; keys may repeat.
pub trait Source {
    /// Returns every pair of `scope`.
    fn pairs(&self, scope: Scope) -> &[(String, String)];
}

type SourceFn<T> = dyn Fn(&mut T, &dyn Source) -> Result<(), BindError> + Send + Sync;
type CtxFn<T> = dyn Fn(&mut T, &Ctx<'_>) -> Result<(), BindError> + Send + Sync;

enum Runner<T> {
    Source(Box<SourceFn<T>>),
    Ctx(Box<CtxFn<T>>),
}

/// What a compiled field decoder does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    /// First value, parsed with [`TextDecode`].
    Scalar,
    /// Every value of the key, in source order.
    Slice,
    /// Indexed keys (`tag.0.sub`, `tag[0].sub`) grouped into elements.
    StructSlice,
    /// A [`CtxUnmarshal`] field.
    Unmarshal,
}

struct FieldDecoder<T> {
    scope: Option<Scope>,
    key: String,
    kind: DecoderKind,
    run: Runner<T>,
}

impl<N: 'static> FieldDecoder<N> {
    /// Rebases a decoder of a nested struct onto its parent.
    fn lift<T, P>(self, project: P) -> FieldDecoder<T>
    where
        T: 'static,
        P: Fn(&mut T) -> &mut N + Send + Sync + 'static,
    {
        let run = match self.run {
            Runner::Source(run) => Runner::Source(Box::new(
                move |target: &mut T, source: &dyn Source| run(project(target), source),
            )),
            Runner::Ctx(run) => Runner::Ctx(Box::new(move |target: &mut T, ctx: &Ctx<'_>| {
                run(project(target), ctx)
            })),
        };
        FieldDecoder {
            scope: self.scope,
            key: self.key,
            kind: self.kind,
            run,
        }
    }
}

/// Collects the field decoders of one target type.
///
/// Fields whose scope belongs to the other [`Mode`] are skipped, so the same
/// description compiles into a request decoder and a body decoder.
pub struct FieldSet<T> {
    mode: Mode,
    prefix: String,
    only: Option<Scope>,
    in_element: bool,
    root: &'static str,
    ancestors: Vec<TypeId>,
    decoders: Vec<FieldDecoder<T>>,
    error: Option<BindError>,
}

impl<T: 'static> FieldSet<T> {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            prefix: String::new(),
            only: None,
            in_element: false,
            root: type_name::<T>(),
            ancestors: vec![TypeId::of::<T>()],
            decoders: Vec::new(),
            error: None,
        }
    }

    /// Binds the first value of `key` into a field.
    ///
    /// A missing key or an empty value leaves the field untouched.
    pub fn scalar<F, P>(&mut self, scope: Scope, key: &str, project: P)
    where
        F: TextDecode,
        P: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        if !self.accepts(scope) {
            return;
        }
        let key = self.full_key(key);
        let lookup = key.clone();
        self.push(
            scope,
            key,
            DecoderKind::Scalar,
            Box::new(move |target: &mut T, source: &dyn Source| {
                if let Some(raw) = first_value(source.pairs(scope), &lookup, scope.folds_case()) {
                    *project(target) = F::decode_text(raw)?;
                }
                Ok(())
            }),
        );
    }

    /// Like [`FieldSet::scalar`], wrapping the value in `Some`.
    pub fn optional<F, P>(&mut self, scope: Scope, key: &str, project: P)
    where
        F: TextDecode,
        P: Fn(&mut T) -> &mut Option<F> + Send + Sync + 'static,
    {
        if !self.accepts(scope) {
            return;
        }
        let key = self.full_key(key);
        let lookup = key.clone();
        self.push(
            scope,
            key,
            DecoderKind::Scalar,
            Box::new(move |target: &mut T, source: &dyn Source| {
                if let Some(raw) = first_value(source.pairs(scope), &lookup, scope.folds_case()) {
                    *project(target) = Some(F::decode_text(raw)?);
                }
                Ok(())
            }),
        );
    }

    /// Binds every value of `key`, in source order, into a `Vec`.
    ///
    /// Values are not split on commas. With no matching key the field
    /// becomes an empty `Vec`.
    pub fn slice<F, P>(&mut self, scope: Scope, key: &str, project: P)
    where
        F: TextDecode,
        P: Fn(&mut T) -> &mut Vec<F> + Send + Sync + 'static,
    {
        if !self.accepts(scope) {
            return;
        }
        let key = self.full_key(key);
        let lookup = key.clone();
        self.push(
            scope,
            key,
            DecoderKind::Slice,
            Box::new(move |target: &mut T, source: &dyn Source| {
                let fold = scope.folds_case();
                let values = source
                    .pairs(scope)
                    .iter()
                    .filter(|(k, _)| key_matches(k, &lookup, fold))
                    .map(|(_, v)| F::decode_text(v))
                    .collect::<Result<Vec<_>, _>>()?;
                *project(target) = values;
                Ok(())
            }),
        );
    }

    /// Binds the fields of a nested struct under `key.` in the same scope.
    ///
    /// Fields of `N` tagged with another scope are skipped.
    pub fn nested<N, P>(&mut self, scope: Scope, key: &str, project: P)
    where
        N: Bind,
        P: Fn(&mut T) -> &mut N + Copy + Send + Sync + 'static,
    {
        if !self.accepts(scope) {
            return;
        }
        let prefix = format!("{}{key}.", self.prefix);
        let Some(mut inner) = self.child::<N>(prefix, scope, self.in_element) else {
            return;
        };
        N::describe(&mut inner);
        if let Some(err) = inner.error {
            self.fail(err);
            return;
        }
        self.decoders
            .extend(inner.decoders.into_iter().map(|d| d.lift(project)));
    }

    /// Binds indexed keys into a `Vec` of structs.
    ///
    /// `tag.0.name` and `tag[0].name` both address the `name` field of the
    /// first element. Elements are ordered by index; gaps are dropped.
    pub fn struct_slice<E, P>(&mut self, scope: Scope, key: &str, project: P)
    where
        E: Bind + Default,
        P: Fn(&mut T) -> &mut Vec<E> + Send + Sync + 'static,
    {
        if !self.accepts(scope) {
            return;
        }
        let Some(mut element) = self.child::<E>(String::new(), scope, true) else {
            return;
        };
        E::describe(&mut element);
        if let Some(err) = element.error {
            self.fail(err);
            return;
        }

        let element = element.decoders;
        let key = self.full_key(key);
        let tag = key.clone();
        self.push(
            scope,
            key,
            DecoderKind::StructSlice,
            Box::new(move |target: &mut T, source: &dyn Source| {
                let mut groups: BTreeMap<usize, Vec<(String, String)>> = BTreeMap::new();
                for (k, v) in source.pairs(scope) {
                    if let Some((index, sub)) = split_indexed(k, &tag, scope.folds_case()) {
                        groups
                            .entry(index)
                            .or_default()
                            .push((sub.to_string(), v.clone()));
                    }
                }

                let mut items = Vec::with_capacity(groups.len());
                for pairs in groups.into_values() {
                    let view = ElementSource {
                        scope,
                        pairs: &pairs,
                    };
                    let mut item = E::default();
                    for decoder in &element {
                        if let Runner::Source(run) = &decoder.run {
                            run(&mut item, &view)?;
                        }
                    }
                    items.push(item);
                }
                *project(target) = items;
                Ok(())
            }),
        );
    }

    /// Registers a field that fills itself from the context.
    ///
    /// Only compiled into request-mode decoders. Not allowed inside
    /// struct-slice elements.
    pub fn unmarshal<F, P>(&mut self, field: &str, project: P)
    where
        F: CtxUnmarshal + 'static,
        P: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        if self.error.is_some() || self.mode != Mode::Request {
            return;
        }
        let key = self.full_key(field);
        if self.in_element {
            self.fail(BindError::UnsupportedType {
                type_name: self.root,
                field: key,
                reason: "context unmarshalers cannot be slice elements".to_string(),
            });
            return;
        }
        self.decoders.push(FieldDecoder {
            scope: None,
            key,
            kind: DecoderKind::Unmarshal,
            run: Runner::Ctx(Box::new(move |target: &mut T, ctx: &Ctx<'_>| {
                project(target).unmarshal_ctx(ctx)
            })),
        });
    }

    fn accepts(&self, scope: Scope) -> bool {
        self.error.is_none()
            && scope.mode() == self.mode
            && !matches!(self.only, Some(only) if only != scope)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    fn push(&mut self, scope: Scope, key: String, kind: DecoderKind, run: Box<SourceFn<T>>) {
        self.decoders.push(FieldDecoder {
            scope: Some(scope),
            key,
            kind,
            run: Runner::Source(run),
        });
    }

    fn fail(&mut self, err: BindError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Starts the field set of a nested or element type, refusing types that
    /// contain themselves.
    fn child<N: 'static>(
        &mut self,
        prefix: String,
        only: Scope,
        in_element: bool,
    ) -> Option<FieldSet<N>> {
        let id = TypeId::of::<N>();
        if self.ancestors.contains(&id) {
            self.fail(BindError::InvalidTarget {
                type_name: self.root,
                reason: format!("{} contains itself", type_name::<N>()),
            });
            return None;
        }
        let mut ancestors = self.ancestors.clone();
        ancestors.push(id);
        Some(FieldSet {
            mode: self.mode,
            prefix,
            only: Some(only),
            in_element,
            root: self.root,
            ancestors,
            decoders: Vec::new(),
            error: None,
        })
    }
}

/// A compiled decoder for one target type and mode.
pub struct Decoder<T> {
    mode: Mode,
    fields: Vec<FieldDecoder<T>>,
}

impl<T: Bind> Decoder<T> {
    /// Compiles the description of `T` for `mode`.
    ///
    /// Usually reached through [`super::decoder`], which caches the result.
    pub fn compile(mode: Mode) -> Result<Self, BindError> {
        let mut set = FieldSet::<T>::new(mode);
        T::describe(&mut set);
        match set.error {
            Some(err) => Err(err),
            None => Ok(Self {
                mode,
                fields: set.decoders,
            }),
        }
    }

    /// Number of field decoders.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field is bound in this mode.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Lists `(scope, key, kind)` per field decoder, in execution order.
    pub fn fields(&self) -> impl Iterator<Item = (Option<Scope>, &str, DecoderKind)> {
        self.fields
            .iter()
            .map(|f| (f.scope, f.key.as_str(), f.kind))
    }

    /// Runs every field decoder against the request. Stops at the first
    /// error; the target is then partially filled.
    pub fn decode(&self, target: &mut T, ctx: &Ctx<'_>) -> Result<(), BindError> {
        for field in &self.fields {
            match &field.run {
                Runner::Source(run) => run(target, ctx)?,
                Runner::Ctx(run) => run(target, ctx)?,
            }
        }
        Ok(())
    }

    /// Runs the scope-based field decoders against any source. Context
    /// unmarshalers are skipped.
    pub fn decode_from(&self, target: &mut T, source: &dyn Source) -> Result<(), BindError> {
        for field in &self.fields {
            if let Runner::Source(run) = &field.run {
                run(target, source)?;
            }
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Decoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("mode", &self.mode)
            .field(
                "fields",
                &self.fields.iter().map(|d| &d.key).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// One element of a struct slice, keyed by the sub-field names.
struct ElementSource<'s> {
    scope: Scope,
    pairs: &'s [(String, String)],
}

impl Source for ElementSource<'_> {
    fn pairs(&self, scope: Scope) -> &[(String, String)] {
        if scope == self.scope {
            self.pairs
        } else {
            &[]
        }
    }
}

fn key_matches(candidate: &str, key: &str, fold: bool) -> bool {
    if fold {
        candidate.eq_ignore_ascii_case(key)
    } else {
        candidate == key
    }
}

fn first_value<'s>(pairs: &'s [(String, String)], key: &str, fold: bool) -> Option<&'s str> {
    pairs
        .iter()
        .find(|(k, _)| key_matches(k, key, fold))
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

/// Splits `tag.3.sub` or `tag[3].sub` into `(3, "sub")`.
fn split_indexed<'k>(key: &'k str, tag: &str, fold: bool) -> Option<(usize, &'k str)> {
    let head = key.get(..tag.len())?;
    if !key_matches(head, tag, fold) {
        return None;
    }
    let rest = &key[tag.len()..];
    let (index, sub) = match rest.strip_prefix('[') {
        Some(rest) => {
            let (index, sub) = rest.split_once(']')?;
            (index, sub.strip_prefix('.')?)
        }
        None => rest.strip_prefix('.')?.split_once('.')?,
    };
    if sub.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((index.parse().ok()?, sub))
}
