//! Pure TypeScript template substitution for the Remotion project (spec §4.8
//! step 2). No I/O; callers write the returned strings to disk.

use crate::composition::CompositionData;
use crate::persona::Persona;

pub fn render_root(composition: &CompositionData) -> String {
    format!(
        r#"import {{ Composition }} from 'remotion';
import {{ VideoGenerator }} from './VideoGenerator';
import compositionData from '../public/composition.json';

export const RemotionRoot: React.FC = () => {{
  return (
    <Composition
      id="VideoGenerator"
      component={{VideoGenerator}}
      durationInFrames={{{total_frames}}}
      fps={{{fps}}}
      width={{{width}}}
      height={{{height}}}
      defaultProps={{{{ data: compositionData }}}}
    />
  );
}};
"#,
        total_frames = composition.total_frames,
        fps = composition.fps,
        width = composition.width,
        height = composition.height,
    )
}

pub fn render_video_generator(composition: &CompositionData, personas: &[Persona]) -> String {
    let use_transitions = composition.transition.transition_type != "none";
    let sequence_body = if use_transitions {
        transition_series_body()
    } else {
        plain_sequence_body()
    };

    let persona_ids: Vec<&str> = personas.iter().map(|p| p.id.as_str()).collect();

    format!(
        r#"import React from 'react';
import {{ AbsoluteFill, Sequence, Audio, Img, useVideoConfig }} from 'remotion';
import {{ TransitionSeries, linearTiming }} from '@remotion/transitions';
import {{ fade }} from '@remotion/transitions/fade';

// Known persona ids for this project: {persona_ids:?}

interface CompositionPhrase {{
  text: string;
  audioFile: string;
  slideFile: string;
  durationFrames: number;
  subtitleColor?: string;
  characterImage?: string;
  background?: string;
}}

interface CompositionData {{
  phrases: CompositionPhrase[];
  background?: string;
  bgm?: string;
}}

export const VideoGenerator: React.FC<{{ data: CompositionData }}> = ({{ data }}) => {{
  const {{ fps }} = useVideoConfig();
{sequence_body}
}};
"#,
        persona_ids = persona_ids,
        sequence_body = sequence_body,
    )
}

fn plain_sequence_body() -> String {
    r#"  let cursor = 0;
  return (
    <AbsoluteFill style={{ backgroundColor: data.background ?? '#000000' }}>
      {data.phrases.map((phrase, i) => {
        const from = cursor;
        cursor += phrase.durationFrames;
        return (
          <Sequence key={i} from={from} durationInFrames={phrase.durationFrames}>
            <Img src={phrase.slideFile} />
            <Audio src={phrase.audioFile} />
          </Sequence>
        );
      })}
    </AbsoluteFill>
  );"#
        .to_string()
}

fn transition_series_body() -> String {
    r#"  return (
    <AbsoluteFill style={{ backgroundColor: data.background ?? '#000000' }}>
      <TransitionSeries>
        {data.phrases.map((phrase, i) => (
          <TransitionSeries.Sequence key={i} durationInFrames={phrase.durationFrames}>
            <Img src={phrase.slideFile} />
            <Audio src={phrase.audioFile} />
          </TransitionSeries.Sequence>
        ))}
      </TransitionSeries>
    </AbsoluteFill>
  );"#
        .to_string()
}
