//! Standard library headers measured by the include-oriented jobs.

use crate::dialect::Standard;
use crate::error::ParseError;
use crate::pathkey::PathKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! stl_headers {
    ($($variant:ident => $name:literal, $dialect:ident;)*) => {
        /// A public standard library header, spelled as it appears in `#include <...>`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StlHeader {
            $($variant,)*
        }

        impl StlHeader {
            pub const ALL: &'static [StlHeader] = &[$(StlHeader::$variant,)*];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(StlHeader::$variant => $name,)*
                }
            }

            /// The first dialect in which the header is available.
            pub fn dialect(&self) -> Standard {
                match self {
                    $(StlHeader::$variant => Standard::$dialect,)*
                }
            }
        }
    };
}

stl_headers! {
    Algorithm => "algorithm", Cpp03;
    Any => "any", Cpp17;
    Array => "array", Cpp11;
    Atomic => "atomic", Cpp11;
    Barrier => "barrier", Cpp20;
    Bit => "bit", Cpp20;
    Bitset => "bitset", Cpp03;
    Cassert => "cassert", Cpp03;
    Ccomplex => "ccomplex", Cpp11;
    Cctype => "cctype", Cpp03;
    Cerrno => "cerrno", Cpp03;
    Cfenv => "cfenv", Cpp11;
    Cfloat => "cfloat", Cpp11;
    Charconv => "charconv", Cpp17;
    Chrono => "chrono", Cpp11;
    Cinttypes => "cinttypes", Cpp11;
    Ciso646 => "ciso646", Cpp03;
    Climits => "climits", Cpp03;
    Clocale => "clocale", Cpp03;
    Cmath => "cmath", Cpp03;
    Codecvt => "codecvt", Cpp11;
    Compare => "compare", Cpp20;
    Complex => "complex", Cpp03;
    ComplexH => "complex.h", Cpp03;
    Concepts => "concepts", Cpp20;
    ConditionVariable => "condition_variable", Cpp11;
    Coroutine => "coroutine", Cpp20;
    Csetjmp => "csetjmp", Cpp11;
    Csignal => "csignal", Cpp03;
    Cstdarg => "cstdarg", Cpp03;
    Cstdbool => "cstdbool", Cpp11;
    Cstddef => "cstddef", Cpp03;
    Cstdint => "cstdint", Cpp11;
    Cstdio => "cstdio", Cpp03;
    Cstdlib => "cstdlib", Cpp03;
    Cstring => "cstring", Cpp03;
    Ctgmath => "ctgmath", Cpp11;
    Ctime => "ctime", Cpp03;
    CtypeH => "ctype.h", Cpp03;
    Cuchar => "cuchar", Cpp11;
    Cwchar => "cwchar", Cpp03;
    Cwctype => "cwctype", Cpp11;
    Deque => "deque", Cpp03;
    ErrnoH => "errno.h", Cpp03;
    Exception => "exception", Cpp03;
    Execution => "execution", Cpp17;
    Expected => "expected", Cpp23;
    FenvH => "fenv.h", Cpp11;
    Filesystem => "filesystem", Cpp17;
    FloatH => "float.h", Cpp03;
    Format => "format", Cpp20;
    ForwardList => "forward_list", Cpp11;
    Fstream => "fstream", Cpp03;
    Functional => "functional", Cpp11;
    Future => "future", Cpp11;
    InitializerList => "initializer_list", Cpp11;
    InttypesH => "inttypes.h", Cpp11;
    Iomanip => "iomanip", Cpp03;
    Ios => "ios", Cpp03;
    Iosfwd => "iosfwd", Cpp03;
    Iostream => "iostream", Cpp03;
    Istream => "istream", Cpp03;
    Iterator => "iterator", Cpp03;
    Latch => "latch", Cpp20;
    Limits => "limits", Cpp03;
    LimitsH => "limits.h", Cpp03;
    List => "list", Cpp03;
    Locale => "locale", Cpp03;
    LocaleH => "locale.h", Cpp03;
    Map => "map", Cpp03;
    MathH => "math.h", Cpp03;
    Mdspan => "mdspan", Cpp23;
    Memory => "memory", Cpp11;
    MemoryResource => "memory_resource", Cpp17;
    Mutex => "mutex", Cpp11;
    New => "new", Cpp03;
    Numbers => "numbers", Cpp20;
    Numeric => "numeric", Cpp03;
    Optional => "optional", Cpp17;
    Ostream => "ostream", Cpp03;
    Print => "print", Cpp26;
    Queue => "queue", Cpp03;
    Random => "random", Cpp11;
    Ranges => "ranges", Cpp20;
    Ratio => "ratio", Cpp11;
    Regex => "regex", Cpp11;
    ScopedAllocator => "scoped_allocator", Cpp11;
    Semaphore => "semaphore", Cpp20;
    Set => "set", Cpp03;
    SetjmpH => "setjmp.h", Cpp03;
    SharedMutex => "shared_mutex", Cpp17;
    SourceLocation => "source_location", Cpp20;
    Span => "span", Cpp20;
    Sstream => "sstream", Cpp03;
    Stack => "stack", Cpp11;
    StdatomicH => "stdatomic.h", Cpp11;
    StdboolH => "stdbool.h", Cpp11;
    StddefH => "stddef.h", Cpp03;
    Stdexcept => "stdexcept", Cpp03;
    StdintH => "stdint.h", Cpp11;
    StdioH => "stdio.h", Cpp03;
    StdlibH => "stdlib.h", Cpp03;
    StopToken => "stop_token", Cpp20;
    Streambuf => "streambuf", Cpp03;
    String => "string", Cpp03;
    StringH => "string.h", Cpp03;
    StringView => "string_view", Cpp17;
    Strstream => "strstream", Cpp03;
    SystemError => "system_error", Cpp11;
    TgmathH => "tgmath.h", Cpp11;
    Thread => "thread", Cpp11;
    Tuple => "tuple", Cpp11;
    TypeTraits => "type_traits", Cpp11;
    Typeindex => "typeindex", Cpp11;
    Typeinfo => "typeinfo", Cpp03;
    UcharH => "uchar.h", Cpp11;
    UnorderedMap => "unordered_map", Cpp11;
    UnorderedSet => "unordered_set", Cpp11;
    Utility => "utility", Cpp11;
    Valarray => "valarray", Cpp03;
    Variant => "variant", Cpp17;
    Vector => "vector", Cpp03;
    Version => "version", Cpp17;
    WcharH => "wchar.h", Cpp03;
    WctypeH => "wctype.h", Cpp03;
}

impl StlHeader {
    pub fn is_c_header(&self) -> bool {
        self.as_str().ends_with(".h")
    }

    /// True if the header exists under `standard`.
    pub fn available_in(&self, standard: Standard) -> bool {
        self.dialect() <= standard
    }

    /// The small, representative sample used for the default graphs.
    pub fn small_core_sample() -> Vec<StlHeader> {
        use StlHeader as H;
        vec![
            H::Algorithm,
            H::Vector,
            H::Memory,
            H::Functional,
            H::Iostream,
            H::Utility,
            H::Tuple,
            H::Numeric,
            H::Chrono,
            H::Random,
            H::TypeTraits,
            H::UnorderedMap,
            H::Map,
            H::String,
            H::StringView,
            H::Fstream,
        ]
    }
}

impl PartialOrd for StlHeader {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StlHeader {
    // Alphabetical by spelling, not by declaration order.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Display for StlHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PathKey for StlHeader {
    fn path_key(&self) -> String {
        self.as_str().to_string()
    }
}

impl FromStr for StlHeader {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches('<').trim_end_matches('>');
        Self::ALL
            .iter()
            .copied()
            .find(|h| h.as_str() == name)
            .ok_or_else(|| ParseError::UnknownHeader(s.trim().to_string()))
    }
}

impl Serialize for StlHeader {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StlHeader {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
