use std::{fmt, sync::Arc};

use topicbus_error::PatternError;

/// Разделитель уровней топика.
pub const TOPIC_SEPARATOR: char = '/';
/// Wildcard одного уровня.
pub const SINGLE_LEVEL_WILDCARD: char = '+';
/// Wildcard всех оставшихся уровней.
pub const MULTI_LEVEL_WILDCARD: char = '#';

const SINGLE_LEVEL_WILDCARD_STR: &str = "+";
const MULTI_LEVEL_WILDCARD_STR: &str = "#";

/// Предикат над строками топиков.
///
/// Реализации неизменяемы после создания, поэтому `matches` можно вызывать из
/// любого количества потоков без синхронизации.
pub trait TopicMatcher: Send + Sync {
    fn matches(
        &self,
        topic: &str,
    ) -> bool;
}

/// Фильтр, совпадающий только с одним топиком.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactFilter {
    topic: Arc<str>,
}

/// Один сегмент скомпилированного шаблона.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Сравнивается посимвольно
    Literal(Box<str>),
    /// `+` - ровно один непустой сегмент
    SingleLevel,
    /// `#` - ноль или более оставшихся сегментов
    MultiLevel,
}

/// Фильтр по шаблону с `+` и `#`.
///
/// Шаблон разбирается на сегменты один раз при создании, сопоставление идёт
/// без аллокаций.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardFilter {
    pattern: Arc<str>,
    segments: Vec<Segment>,
}

/// Фильтр топиков: точный или по шаблону.
///
/// Единая точка входа - [`TopicFilter::new`]: остальным компонентам не нужно
/// знать о вариантах.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicFilter {
    Exact(ExactFilter),
    Wildcard(WildcardFilter),
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ExactFilter {
    pub fn new(topic: impl Into<Arc<str>>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl WildcardFilter {
    /// Компилирует шаблон.
    ///
    /// В строгом режиме `#` обязан быть последним и единственным символом
    /// сегмента, а `+` - единственным символом сегмента. В нестрогом режиме
    /// смешанные сегменты сравниваются как обычный текст, а `#` в середине
    /// шаблона поглощает остаток топика.
    pub fn new(
        pattern: &str,
        strict: bool,
    ) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        let raw: Vec<&str> = pattern.split(TOPIC_SEPARATOR).collect();
        let mut segments = Vec::with_capacity(raw.len());

        for (idx, part) in raw.iter().enumerate() {
            match *part {
                MULTI_LEVEL_WILDCARD_STR => {
                    if strict && idx + 1 != raw.len() {
                        return Err(PatternError::MisplacedMultiLevel {
                            pattern: pattern.to_string(),
                        });
                    }
                    segments.push(Segment::MultiLevel);
                    // всё, что после `#`, уже не влияет на результат
                    break;
                }
                SINGLE_LEVEL_WILDCARD_STR => segments.push(Segment::SingleLevel),
                other => {
                    if strict && TopicFilter::has_wildcards(other) {
                        if other.contains(MULTI_LEVEL_WILDCARD) && idx + 1 != raw.len() {
                            return Err(PatternError::MisplacedMultiLevel {
                                pattern: pattern.to_string(),
                            });
                        }
                        return Err(PatternError::MixedWildcard {
                            pattern: pattern.to_string(),
                            segment: other.to_string(),
                        });
                    }
                    segments.push(Segment::Literal(other.into()));
                }
            }
        }

        Ok(Self {
            pattern: Arc::from(pattern),
            segments,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl TopicFilter {
    /// Фабрика фильтров в нестрогом режиме.
    ///
    /// Возвращает [`TopicFilter::Exact`], если в шаблоне нет `+`/`#`, иначе
    /// [`TopicFilter::Wildcard`].
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        Self::with_strictness(pattern, false)
    }

    /// Фабрика фильтров с явным выбором режима проверки шаблона.
    pub fn with_strictness(
        pattern: &str,
        strict: bool,
    ) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if Self::has_wildcards(pattern) {
            WildcardFilter::new(pattern, strict).map(Self::Wildcard)
        } else {
            Ok(Self::Exact(ExactFilter::new(pattern)))
        }
    }

    /// Содержит ли строка символы `+` или `#`.
    pub fn has_wildcards(pattern: &str) -> bool {
        pattern.contains([SINGLE_LEVEL_WILDCARD, MULTI_LEVEL_WILDCARD])
    }

    /// Исходный шаблон, из которого построен фильтр.
    pub fn pattern(&self) -> &str {
        match self {
            Self::Exact(f) => f.topic(),
            Self::Wildcard(f) => f.pattern(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard(_))
    }

    #[inline]
    pub fn matches(
        &self,
        topic: &str,
    ) -> bool {
        match self {
            Self::Exact(f) => f.matches(topic),
            Self::Wildcard(f) => f.matches(topic),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl TopicMatcher for ExactFilter {
    #[inline]
    fn matches(
        &self,
        topic: &str,
    ) -> bool {
        &*self.topic == topic
    }
}

impl TopicMatcher for WildcardFilter {
    fn matches(
        &self,
        topic: &str,
    ) -> bool {
        let mut levels = topic.split(TOPIC_SEPARATOR);

        for segment in &self.segments {
            match segment {
                Segment::MultiLevel => return true,
                Segment::SingleLevel => match levels.next() {
                    Some(level) if !level.is_empty() => {}
                    _ => return false,
                },
                Segment::Literal(expected) => match levels.next() {
                    Some(level) if level == &**expected => {}
                    _ => return false,
                },
            }
        }

        levels.next().is_none()
    }
}

impl TopicMatcher for TopicFilter {
    fn matches(
        &self,
        topic: &str,
    ) -> bool {
        TopicFilter::matches(self, topic)
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.pattern())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
