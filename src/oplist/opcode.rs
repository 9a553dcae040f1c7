macro_rules! op_codes {
    ($($variant:ident = $code:literal => $name:literal,)*) => {
        /// Operator codes understood by the graphics engine.
        ///
        /// The numbering is contiguous and stable; `dispatch` relies on it for a dense jump table.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum OpCode {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant = $code,
            )*
        }

        impl OpCode {
            /// Every operator code, in numeric order.
            pub const ALL: &'static [OpCode] = &[$(OpCode::$variant,)*];

            /// Look up an operator by numeric code.
            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Look up an operator by its wire name (`"constructPath"`, `"fill"`, ...).
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Wire name of this operator.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }
    };
}

op_codes! {
    Dependency = 1 => "dependency",
    SetLineWidth = 2 => "setLineWidth",
    SetLineCap = 3 => "setLineCap",
    SetLineJoin = 4 => "setLineJoin",
    SetMiterLimit = 5 => "setMiterLimit",
    SetDash = 6 => "setDash",
    SetRenderingIntent = 7 => "setRenderingIntent",
    SetFlatness = 8 => "setFlatness",
    SetGState = 9 => "setGState",
    Save = 10 => "save",
    Restore = 11 => "restore",
    Transform = 12 => "transform",
    MoveTo = 13 => "moveTo",
    LineTo = 14 => "lineTo",
    CurveTo = 15 => "curveTo",
    CurveTo2 = 16 => "curveTo2",
    CurveTo3 = 17 => "curveTo3",
    ClosePath = 18 => "closePath",
    Rectangle = 19 => "rectangle",
    Stroke = 20 => "stroke",
    CloseStroke = 21 => "closeStroke",
    Fill = 22 => "fill",
    EoFill = 23 => "eoFill",
    FillStroke = 24 => "fillStroke",
    EoFillStroke = 25 => "eoFillStroke",
    CloseFillStroke = 26 => "closeFillStroke",
    CloseEoFillStroke = 27 => "closeEOFillStroke",
    EndPath = 28 => "endPath",
    Clip = 29 => "clip",
    EoClip = 30 => "eoClip",
    BeginText = 31 => "beginText",
    EndText = 32 => "endText",
    SetCharSpacing = 33 => "setCharSpacing",
    SetWordSpacing = 34 => "setWordSpacing",
    SetHScale = 35 => "setHScale",
    SetLeading = 36 => "setLeading",
    SetFont = 37 => "setFont",
    SetTextRenderingMode = 38 => "setTextRenderingMode",
    SetTextRise = 39 => "setTextRise",
    MoveText = 40 => "moveText",
    SetLeadingMoveText = 41 => "setLeadingMoveText",
    SetTextMatrix = 42 => "setTextMatrix",
    NextLine = 43 => "nextLine",
    ShowText = 44 => "showText",
    ShowSpacedText = 45 => "showSpacedText",
    NextLineShowText = 46 => "nextLineShowText",
    NextLineSetSpacingShowText = 47 => "nextLineSetSpacingShowText",
    SetCharWidth = 48 => "setCharWidth",
    SetCharWidthAndBounds = 49 => "setCharWidthAndBounds",
    SetStrokeColorSpace = 50 => "setStrokeColorSpace",
    SetFillColorSpace = 51 => "setFillColorSpace",
    SetStrokeColor = 52 => "setStrokeColor",
    SetStrokeColorN = 53 => "setStrokeColorN",
    SetFillColor = 54 => "setFillColor",
    SetFillColorN = 55 => "setFillColorN",
    SetStrokeGray = 56 => "setStrokeGray",
    SetFillGray = 57 => "setFillGray",
    SetStrokeRgbColor = 58 => "setStrokeRGBColor",
    SetFillRgbColor = 59 => "setFillRGBColor",
    SetStrokeCmykColor = 60 => "setStrokeCMYKColor",
    SetFillCmykColor = 61 => "setFillCMYKColor",
    ShadingFill = 62 => "shadingFill",
    BeginInlineImage = 63 => "beginInlineImage",
    BeginImageData = 64 => "beginImageData",
    EndInlineImage = 65 => "endInlineImage",
    PaintXObject = 66 => "paintXObject",
    MarkPoint = 67 => "markPoint",
    MarkPointProps = 68 => "markPointProps",
    BeginMarkedContent = 69 => "beginMarkedContent",
    BeginMarkedContentProps = 70 => "beginMarkedContentProps",
    EndMarkedContent = 71 => "endMarkedContent",
    BeginCompat = 72 => "beginCompat",
    EndCompat = 73 => "endCompat",
    PaintFormXObjectBegin = 74 => "paintFormXObjectBegin",
    PaintFormXObjectEnd = 75 => "paintFormXObjectEnd",
    BeginGroup = 76 => "beginGroup",
    EndGroup = 77 => "endGroup",
    BeginAnnotations = 78 => "beginAnnotations",
    EndAnnotations = 79 => "endAnnotations",
    BeginAnnotation = 80 => "beginAnnotation",
    EndAnnotation = 81 => "endAnnotation",
    PaintJpegXObject = 82 => "paintJpegXObject",
    PaintImageMaskXObject = 83 => "paintImageMaskXObject",
    PaintImageMaskXObjectGroup = 84 => "paintImageMaskXObjectGroup",
    PaintImageXObject = 85 => "paintImageXObject",
    PaintInlineImageXObject = 86 => "paintInlineImageXObject",
    PaintInlineImageXObjectGroup = 87 => "paintInlineImageXObjectGroup",
    PaintImageXObjectRepeat = 88 => "paintImageXObjectRepeat",
    PaintImageMaskXObjectRepeat = 89 => "paintImageMaskXObjectRepeat",
    PaintSolidColorImageMask = 90 => "paintSolidColorImageMask",
    ConstructPath = 91 => "constructPath",
}

impl OpCode {
    /// One past the highest operator code.
    pub const COUNT: usize = 92;

    /// Numeric code of this operator.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
