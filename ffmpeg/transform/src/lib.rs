/*!
    Media frame transformation for the ffmpeg crate ecosystem.

    This crate converts frames between formats. For video: scaling, pixel format
    conversion. For audio: resampling, channel layout conversion, sample format
    conversion.
*/
